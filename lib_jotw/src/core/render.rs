use super::model::Entry;
use super::poll_cycle::PollRound;
use super::tally::RankedSymbol;
use super::transport::IdentityResolver;

pub const POLL_TITLE: &str = "Vote for the Joke of the Week";
pub const POLL_DESCRIPTION: &str = "React with the emoji of the joke you think was the funniest.";
pub const RESULTS_TITLE: &str = "🎉 The Joke of the Week!";
pub const SUBMITTED_TITLE: &str = "🥳 Joke submitted";
pub const NO_VOTES: &str = "Nobody voted this week.";

fn author_name(entry: &Entry, identity: &dyn IdentityResolver) -> String {
    identity
        .display_name(entry.author_id())
        .unwrap_or_else(|| entry.author_display_name().to_string())
}

/// Poll body: title, instructions, then one `symbol author` / `text` pair per joke.
pub fn poll(round: &PollRound, identity: &dyn IdentityResolver) -> String {
    let mut out = format!("**{POLL_TITLE}**\n{POLL_DESCRIPTION}\n");
    for (symbol, entry) in round.assignment() {
        out.push_str(&format!("\n{symbol} {}\n{}\n", author_name(entry, identity), entry.text));
    }
    out
}

pub fn results(round: &PollRound, ranking: &[RankedSymbol], identity: &dyn IdentityResolver) -> String {
    let mut out = format!("**{RESULTS_TITLE}**\n");
    if ranking.is_empty() {
        out.push_str(NO_VOTES);
        out.push('\n');
        return out;
    }
    for ranked in ranking {
        let Some(entry) = round.entry_for(&ranked.symbol) else {
            continue;
        };
        let noun = if ranked.votes == 1 { "vote" } else { "votes" };
        out.push_str(&format!(
            "\n{} {noun}\n{} {} - {}\n",
            ranked.votes,
            ranked.symbol,
            entry.text,
            author_name(entry, identity)
        ));
    }
    out
}

/// Confirmation shown to the submitter.
pub fn submitted(entry: &Entry) -> String {
    format!("**{SUBMITTED_TITLE}**\n{}\n{}", entry.author_display_name(), entry.text)
}
