use crate::models::Ballot;
use crate::voting::Tally;
use log::warn;

/// Count single-choice ballots.
///
/// Every declared option starts at zero so uncast options still show up; a write-in gets its
/// own entry the first time it is counted. Ranked ballots have no single choice and are skipped.
pub fn calculate_tally(options: &[String], ballots: &[Ballot]) -> Tally {
    let mut tally: Tally = options.iter().map(|option| (option.clone(), 0)).collect();

    for ballot in ballots {
        match ballot {
            Ballot::Plurality { option } => {
                *tally.entry(option.clone()).or_insert(0) += 1;
            }
            Ballot::Ranked { .. } => {
                warn!("Skipping ranked ballot in a plurality count");
            }
        }
    }

    tally
}
