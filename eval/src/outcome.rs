use serde::{Deserialize, Serialize};

use crate::judge::{Judgment, RunRecord};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Fail,
    Error,
}

pub fn classify_outcome(record: &RunRecord, judgment: &Judgment) -> Outcome {
    match record.stop {
        None => Outcome::Error,
        Some(_) if judgment.all_passed() => Outcome::Success,
        Some(_) => Outcome::Fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::CheckOutcome;
    use sposh::looping::LoopStop;

    fn judgment(pass: bool) -> Judgment {
        Judgment {
            checks: vec![CheckOutcome::Outcome {
                expect: LoopStop::Won,
                actual: Some(LoopStop::Won),
                passed: pass,
            }],
        }
    }

    fn record(stop: Option<LoopStop>) -> RunRecord {
        RunRecord {
            stop,
            ..RunRecord::default()
        }
    }

    #[test]
    fn success_when_finished_and_checks_pass() {
        let outcome = classify_outcome(&record(Some(LoopStop::Won)), &judgment(true));
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn fail_when_finished_but_checks_fail() {
        let outcome = classify_outcome(&record(Some(LoopStop::StepLimit)), &judgment(false));
        assert_eq!(outcome, Outcome::Fail);
    }

    #[test]
    fn error_when_run_errored() {
        let outcome = classify_outcome(&record(None), &judgment(true));
        assert_eq!(outcome, Outcome::Error);
    }
}
