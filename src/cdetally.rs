use log::{debug, info, warn};

use ballot_tally::*;
use snafu::{prelude::*, Snafu};

use std::fs;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::cdetally::summary::build_summary_js;

mod summary;

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary of ballot {ballot_id}"))]
    SerializingSummary {
        source: serde_json::Error,
        ballot_id: BallotId,
    },
    #[snafu(display("Error writing summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Ballot {ballot_id} cannot be recounted"))]
    Recount {
        source: TallyError,
        ballot_id: BallotId,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type CliResult<T> = Result<T, CliError>;

fn read_result_file(path: &str) -> CliResult<BallotResultFile> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let file: BallotResultFile =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!(
        "read_result_file: ballot {} with {} votes",
        file.ballot_id,
        file.votes.len()
    );
    Ok(file)
}

fn read_summary(path: &str) -> CliResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

/// Recounts the result file named in `args` and checks it against the
/// published result and the reference summary, if any.
///
/// Returns the recounted summary.
pub fn run_verification(args: &Args) -> CliResult<JSValue> {
    let file = read_result_file(&args.input)?;
    info!(
        "Recounting ballot {} ({:?}) of assembly {}",
        file.ballot_id, file.title, file.assembly_id
    );

    let report = file.recount().context(RecountSnafu {
        ballot_id: file.ballot_id,
    })?;

    if report.vote_count != file.vote_count {
        whatever!(
            "The file announces {} votes but contains {}",
            file.vote_count,
            report.vote_count
        )
    }
    if report.condensed != file.result {
        warn!(
            "Published result {:?}, recounted {:?}",
            file.result, report.condensed
        );
        whatever!(
            "Difference detected between the published result {} and the recount {}",
            file.result,
            report.condensed
        )
    }
    info!("Recount matches the published result {}", report.condensed);

    if let Some(secret) = &args.secret {
        match file.find_vote(secret) {
            Some(v) => println!("Your vote: {}", v.vote),
            None => println!("No vote was cast with this secret."),
        }
    }

    let result_js = build_summary_js(&file, &report);
    let pretty_js_stats =
        serde_json::to_string_pretty(&result_js).context(SerializingSummarySnafu {
            ballot_id: file.ballot_id,
        })?;

    match args.out.as_deref() {
        Some("stdout") => println!("{}", pretty_js_stats),
        Some(path) => {
            fs::write(path, &pretty_js_stats).context(WritingSummarySnafu { path })?;
            info!("Summary written to {}", path);
        }
        None => {}
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(SerializingSummarySnafu {
                ballot_id: file.ballot_id,
            })?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(result_js)
}
