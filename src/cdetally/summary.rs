use ballot_tally::{BallotResultFile, Outcome, TallyReport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SummaryBallot {
    #[serde(rename = "assemblyId")]
    pub assembly_id: u64,
    #[serde(rename = "ballotId")]
    pub ballot_id: u64,
    pub title: String,
    #[serde(rename = "useBar")]
    pub use_bar: bool,
    #[serde(rename = "votesAllowed")]
    pub votes_allowed: Option<u32>,
}

fn outcome_to_json(outcome: &Outcome) -> JSValue {
    match outcome {
        Outcome::Winners(names) => json!({ "winners": names }),
        Outcome::Rejected => json!("rejected"),
    }
}

/// Support counts as nested objects: `pairwise[pro][contra]`.
fn pairwise_to_json(report: &TallyReport) -> JSValue {
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for ps in report.pairwise.iter() {
        let row = res
            .entry(ps.pro.clone())
            .or_insert_with(|| JSValue::Object(JSMap::new()));
        if let JSValue::Object(m) = row {
            m.insert(ps.contra.clone(), json!(ps.support.to_string()));
        }
    }
    JSValue::Object(res)
}

pub fn build_summary_js(file: &BallotResultFile, report: &TallyReport) -> JSValue {
    let b = SummaryBallot {
        assembly_id: file.assembly_id,
        ballot_id: file.ballot_id,
        title: file.title.clone(),
        use_bar: file.use_bar,
        votes_allowed: file.votes_allowed,
    };
    let mut results = json!({
        "ranking": report.ranking,
        "condensed": report.condensed,
        "outcome": outcome_to_json(&report.outcome),
        "voteCount": report.vote_count.to_string(),
        "abstentions": report.abstentions.to_string(),
        "pairwise": pairwise_to_json(report),
    });
    if let Some(approvals) = &report.approvals {
        let mut m: JSMap<String, JSValue> = JSMap::new();
        for (name, count) in approvals {
            m.insert(name.clone(), json!(count.to_string()));
        }
        results["approvals"] = JSValue::Object(m);
    }
    json!({
        "ballot": b,
        "results": results })
}
