//! Parsed plan descriptors: names are still unresolved strings.
//!
//! `PlanSource` is what the parser produces and what the plan builder
//! consumes. Its `Display` impl renders canonical LAP text that parses back
//! to an equal value.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

/// The three free-text lines of a `(documentation ...)` block, quotes removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Docstring {
    pub title: String,
    pub author: String,
    pub memo: String,
}

/// A sense reference inside a goal, trigger or action pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SenseSpec {
    /// A bare name: truthiness of the sense read.
    SenseAct { name: String },
    /// `(name [value [predicate]])`.
    Check {
        name: String,
        value: Option<String>,
        predicate: Option<String>,
    },
}

impl SenseSpec {
    pub fn name(&self) -> &str {
        match self {
            SenseSpec::SenseAct { name } | SenseSpec::Check { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveElementSpec {
    pub name: String,
    pub trigger: Option<Vec<SenseSpec>>,
    pub target: String,
    /// Minimum milliseconds between firings.
    pub interval_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveCollectionSpec {
    /// Drive collection tag as written (`SDC`, `SRDC`, `DC`, `RDC`).
    pub kind: String,
    pub name: String,
    pub goal: Option<Vec<SenseSpec>>,
    pub priorities: Vec<Vec<DriveElementSpec>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetenceElementSpec {
    pub name: String,
    pub trigger: Option<Vec<SenseSpec>>,
    pub target: String,
    /// Negative means unbounded.
    pub max_retries: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetenceSpec {
    pub name: String,
    /// Parsed but not used by the slip-stack engine.
    pub time_ms: Option<i64>,
    pub goal: Option<Vec<SenseSpec>>,
    pub priorities: Vec<Vec<CompetenceElementSpec>>,
}

/// One step of an action pattern as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternStepSpec {
    /// Bare name: an action, a sense-act, or a trailing competence.
    Named { name: String },
    /// A full sense `(name [value [predicate]])`.
    Sense {
        name: String,
        value: Option<String>,
        predicate: Option<String>,
    },
}

impl PatternStepSpec {
    pub fn name(&self) -> &str {
        match self {
            PatternStepSpec::Named { name } | PatternStepSpec::Sense { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPatternSpec {
    pub name: String,
    /// Parsed but not used by the slip-stack engine.
    pub time_ms: Option<i64>,
    pub steps: Vec<PatternStepSpec>,
}

/// Everything a plan file declares, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSource {
    pub docstring: Option<Docstring>,
    pub drive_collection: Option<DriveCollectionSpec>,
    pub competences: Vec<CompetenceSpec>,
    pub action_patterns: Vec<ActionPatternSpec>,
}

impl PlanSource {
    /// Name of the plan root: the drive collection, or the single node of a
    /// drive-less plan.
    pub fn root_name(&self) -> Option<&str> {
        if let Some(dc) = &self.drive_collection {
            return Some(&dc.name);
        }
        self.competences
            .first()
            .map(|c| c.name.as_str())
            .or_else(|| self.action_patterns.first().map(|ap| ap.name.as_str()))
    }
}

fn write_check(out: &mut String, name: &str, value: &Option<String>, predicate: &Option<String>) {
    out.push('(');
    out.push_str(name);
    if let Some(value) = value {
        out.push(' ');
        out.push_str(value);
        if let Some(predicate) = predicate {
            out.push(' ');
            out.push_str(predicate);
        }
    }
    out.push(')');
}

fn write_senses(out: &mut String, keyword: &str, senses: &Option<Vec<SenseSpec>>) {
    let Some(senses) = senses.as_ref().filter(|s| !s.is_empty()) else {
        out.push_str("nil");
        return;
    };
    let _ = write!(out, "({keyword} (");
    for (i, sense) in senses.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        match sense {
            SenseSpec::SenseAct { name } => out.push_str(name),
            SenseSpec::Check {
                name,
                value,
                predicate,
            } => write_check(out, name, value, predicate),
        }
    }
    out.push_str("))");
}

fn write_millis(out: &mut String, millis: Option<i64>) {
    match millis {
        Some(ms) => {
            let _ = write!(out, "(none {ms})");
        }
        None => out.push_str("nil"),
    }
}

impl fmt::Display for PlanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("(\n");

        if let Some(doc) = &self.docstring {
            let _ = writeln!(
                out,
                "  (documentation \"{}\" \"{}\" \"{}\")",
                doc.title, doc.author, doc.memo
            );
        }

        if let Some(dc) = &self.drive_collection {
            let _ = write!(out, "  ({} {} ", dc.kind, dc.name);
            write_senses(&mut out, "goal", &dc.goal);
            out.push_str(" (drives\n");
            for level in &dc.priorities {
                out.push_str("    (");
                for (i, element) in level.iter().enumerate() {
                    if i > 0 {
                        out.push_str("\n     ");
                    }
                    let _ = write!(out, "({} ", element.name);
                    write_senses(&mut out, "trigger", &element.trigger);
                    let _ = write!(out, " {} ", element.target);
                    write_millis(&mut out, element.interval_ms);
                    out.push(')');
                }
                out.push_str(")\n");
            }
            out.push_str("  ))\n");
        }

        for competence in &self.competences {
            let _ = write!(out, "  (C {} ", competence.name);
            write_millis(&mut out, competence.time_ms);
            out.push(' ');
            write_senses(&mut out, "goal", &competence.goal);
            out.push_str(" (elements\n");
            for level in &competence.priorities {
                out.push_str("    (");
                for (i, element) in level.iter().enumerate() {
                    if i > 0 {
                        out.push_str("\n     ");
                    }
                    let _ = write!(out, "({} ", element.name);
                    write_senses(&mut out, "trigger", &element.trigger);
                    let _ = write!(out, " {} {})", element.target, element.max_retries);
                }
                out.push_str(")\n");
            }
            out.push_str("  ))\n");
        }

        for pattern in &self.action_patterns {
            let _ = write!(out, "  (AP {} ", pattern.name);
            write_millis(&mut out, pattern.time_ms);
            out.push_str(" (");
            for (i, step) in pattern.steps.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                match step {
                    PatternStepSpec::Named { name } => out.push_str(name),
                    PatternStepSpec::Sense {
                        name,
                        value,
                        predicate,
                    } => write_check(&mut out, name, value, predicate),
                }
            }
            out.push_str("))\n");
        }

        out.push_str(")\n");
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_goalless_drive_collection() {
        let plan = PlanSource {
            drive_collection: Some(DriveCollectionSpec {
                kind: "SDC".to_string(),
                name: "life".to_string(),
                goal: None,
                priorities: vec![vec![DriveElementSpec {
                    name: "e1".to_string(),
                    trigger: None,
                    target: "doThing".to_string(),
                    interval_ms: Some(250),
                }]],
            }),
            ..PlanSource::default()
        };
        let text = plan.to_string();
        assert!(text.contains("(SDC life nil (drives"));
        assert!(text.contains("(e1 nil doThing (none 250))"));
    }

    #[test]
    fn renders_full_sense_checks() {
        let mut out = String::new();
        write_senses(
            &mut out,
            "trigger",
            &Some(vec![
                SenseSpec::SenseAct {
                    name: "hungry".to_string(),
                },
                SenseSpec::Check {
                    name: "energy".to_string(),
                    value: Some("10".to_string()),
                    predicate: Some("<".to_string()),
                },
            ]),
        );
        assert_eq!(out, "(trigger (hungry (energy 10 <)))");
    }

    #[test]
    fn root_name_prefers_drive_collection() {
        let plan = PlanSource {
            competences: vec![CompetenceSpec {
                name: "solo".to_string(),
                time_ms: None,
                goal: None,
                priorities: Vec::new(),
            }],
            ..PlanSource::default()
        };
        assert_eq!(plan.root_name(), Some("solo"));
    }
}
