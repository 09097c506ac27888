// src/results.rs
use crate::error::AppError;
use crate::ledger::VoteLedger;
use crate::models::{OptionResult, Poll, PollResults};

/// Joins a poll with live tallies, one count per option in display order.
pub async fn aggregate(poll: &Poll, ledger: &VoteLedger) -> Result<PollResults, AppError> {
    let mut results = Vec::with_capacity(poll.options.len());
    for option in &poll.options {
        results.push(OptionResult {
            option_id: option.id,
            text: option.text.clone(),
            vote_count: ledger.tally_by_option(option).await?,
        });
    }

    Ok(PollResults {
        poll_id: poll.id,
        title: poll.title.clone(),
        description: poll.description.clone(),
        total_votes: results.iter().map(|r| r.vote_count).sum(),
        results,
    })
}
