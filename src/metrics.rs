use ndarray::ArrayView1;

use crate::error::{Result, SurvivalError};

/// Harrell's C-index with tie handling - how often does a higher risk score
/// line up with a shorter time to event?
pub fn harrell_c_index(
    risk_scores: ArrayView1<f64>,
    durations: ArrayView1<f64>,
    events: &[bool],
) -> Result<f64> {
    let n = risk_scores.len();
    if n != durations.len() || n != events.len() {
        return Err(SurvivalError::invalid_dimensions(
            "risk scores, durations, and events must have same length",
        ));
    }

    let mut concordant = 0.0;
    let mut discordant = 0.0;
    let mut tied_risk = 0.0;

    for i in 0..n {
        if !events[i] {
            continue; // censored rows never anchor a comparison
        }

        for j in 0..n {
            if i == j {
                continue;
            }

            // j is comparable if it outlasted i (event later, or censored no
            // earlier than i's event)
            if durations[j] > durations[i] || (!events[j] && durations[j] >= durations[i]) {
                if risk_scores[i] > risk_scores[j] {
                    concordant += 1.0;
                } else if risk_scores[i] < risk_scores[j] {
                    discordant += 1.0;
                } else {
                    tied_risk += 1.0;
                }
            }
        }
    }

    let total_pairs = concordant + discordant + tied_risk;
    if total_pairs == 0.0 {
        return Err(SurvivalError::numerical_error(
            "no comparable pairs for concordance",
        ));
    }

    Ok((concordant + 0.5 * tied_risk) / total_pairs)
}
