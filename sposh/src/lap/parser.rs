//! One-token-lookahead recursive descent parser for LAP plans.
//!
//! Optional slots written `nil | '(' x` in the grammar may also be left out
//! entirely wherever the next token disambiguates. Errors carry the line the
//! lexer has reached, which is the line of the lookahead token.

use crate::error::SyntaxError;
use crate::lap::lexer::Lexer;
use crate::lap::plan::{
    ActionPatternSpec, CompetenceElementSpec, CompetenceSpec, Docstring, DriveCollectionSpec,
    DriveElementSpec, PatternStepSpec, PlanSource, SenseSpec,
};
use crate::lap::token::{Token, TokenKind};

type ParseResult<T> = Result<T, SyntaxError>;

const TIME_UNITS: [TokenKind; 4] = [
    TokenKind::Hours,
    TokenKind::Minutes,
    TokenKind::Seconds,
    TokenKind::NoUnit,
];

const FREQ_UNITS: [TokenKind; 6] = [
    TokenKind::Hours,
    TokenKind::Minutes,
    TokenKind::Seconds,
    TokenKind::Hz,
    TokenKind::Pm,
    TokenKind::NoUnit,
];

const VALUE_KINDS: [TokenKind; 5] = [
    TokenKind::NumInt,
    TokenKind::NumFloat,
    TokenKind::Name,
    TokenKind::StringValue,
    TokenKind::Nil,
];

/// Parse a whole plan.
pub fn parse_plan(source: &str) -> ParseResult<PlanSource> {
    Parser::new(source).parse()
}

pub struct Parser {
    lexer: Lexer,
    current: Option<Token>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    pub fn parse(mut self) -> ParseResult<PlanSource> {
        self.plan()
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(SyntaxError::new(self.lexer.line(), message))
    }

    fn peek(&self) -> ParseResult<TokenKind> {
        match &self.current {
            Some(token) => Ok(token.kind),
            None => self.error("unexpected end of input"),
        }
    }

    fn at(&self, kinds: &[TokenKind]) -> ParseResult<bool> {
        Ok(kinds.contains(&self.peek()?))
    }

    fn found(&self) -> &str {
        self.current.as_ref().map_or("", |t| t.text.as_str())
    }

    fn skip(&mut self) {
        self.current = self.lexer.next_token();
    }

    /// Consume the lookahead if it is one of `kinds`.
    fn expect(&mut self, kinds: &[TokenKind], what: &str) -> ParseResult<Token> {
        if !self.at(kinds)? {
            return self.error(format!("expected {what}, found '{}'", self.found()));
        }
        match self.current.take() {
            Some(token) => {
                self.skip();
                Ok(token)
            }
            None => self.error("unexpected end of input"),
        }
    }

    fn plan(&mut self) -> ParseResult<PlanSource> {
        let mut plan = PlanSource::default();
        self.expect(&[TokenKind::LParen], "'(' to start the plan")?;

        let mut seen = 0usize;
        loop {
            if !self.at(&[TokenKind::LParen, TokenKind::RParen])? {
                return self.error(format!(
                    "expected '(' to open a plan element or ')' to end the plan, found '{}'",
                    self.found()
                ));
            }
            if self.at(&[TokenKind::RParen])? {
                self.skip();
                break;
            }
            self.skip();

            match self.peek()? {
                TokenKind::Documentation => {
                    if seen > 0 {
                        return self.error("documentation is only allowed as the first plan element");
                    }
                    plan.docstring = Some(self.docstring()?);
                }
                TokenKind::C => plan.competences.push(self.competence()?),
                TokenKind::Ap => plan.action_patterns.push(self.action_pattern()?),
                kind if kind.is_drive_collection() => {
                    if plan.drive_collection.is_some() {
                        return self.error("a plan allows only a single drive collection");
                    }
                    plan.drive_collection = Some(self.drive_collection()?);
                }
                _ => {
                    return self.error(format!(
                        "expected documentation, competence, action pattern or drive collection, found '{}'",
                        self.found()
                    ));
                }
            }
            seen += 1;
        }

        if let Some(token) = &self.current {
            return self.error(format!("unexpected '{}' after the end of the plan", token.text));
        }
        if plan.drive_collection.is_none()
            && plan.competences.len() + plan.action_patterns.len() != 1
        {
            return self.error(
                "a plan without a drive collection must consist of exactly one competence or one action pattern",
            );
        }
        Ok(plan)
    }

    fn docstring(&mut self) -> ParseResult<Docstring> {
        self.expect(&[TokenKind::Documentation], "'documentation'")?;
        let mut lines = Vec::with_capacity(3);
        for _ in 0..3 {
            let token = self.expect(&[TokenKind::Comment], "a quoted documentation string")?;
            lines.push(unquote(&token.text).to_string());
        }
        self.expect(&[TokenKind::RParen], "')' to end the documentation")?;
        let mut lines = lines.into_iter();
        Ok(Docstring {
            title: lines.next().unwrap_or_default(),
            author: lines.next().unwrap_or_default(),
            memo: lines.next().unwrap_or_default(),
        })
    }

    fn drive_collection(&mut self) -> ParseResult<DriveCollectionSpec> {
        let kind = self.expect(
            &[TokenKind::Dc, TokenKind::Rdc, TokenKind::Sdc, TokenKind::Srdc],
            "a drive collection tag",
        )?;
        let name = self.expect(&[TokenKind::Name], "a drive collection name")?.text;
        let goal = self.goal_slot(&name)?;
        self.expect(
            &[TokenKind::Drives],
            &format!("'drives' in drive collection '{name}'"),
        )?;

        let mut priorities = Vec::new();
        if !self.at(&[TokenKind::LParen])? {
            return self.error(format!(
                "expected '(' to open a drive priority level in '{name}', found '{}'",
                self.found()
            ));
        }
        while self.at(&[TokenKind::LParen])? {
            priorities.push(self.drive_elements()?);
        }

        for _ in 0..2 {
            self.expect(
                &[TokenKind::RParen],
                &format!("')' to end drive collection '{name}'"),
            )?;
        }
        Ok(DriveCollectionSpec {
            kind: kind.text,
            name,
            goal,
            priorities,
        })
    }

    /// `nil '('`, `'(' goal '('`, or a bare `'('` before the element list.
    fn goal_slot(&mut self, owner: &str) -> ParseResult<Option<Vec<SenseSpec>>> {
        if self.at(&[TokenKind::Nil])? {
            self.skip();
            self.expect(&[TokenKind::LParen], &format!("'(' after 'nil' in '{owner}'"))?;
            return Ok(None);
        }
        self.expect(&[TokenKind::LParen], &format!("'(' or 'nil' in '{owner}'"))?;
        if self.at(&[TokenKind::Goal])? {
            let goal = self.goal()?;
            self.expect(&[TokenKind::LParen], &format!("'(' after the goal of '{owner}'"))?;
            return Ok(goal);
        }
        Ok(None)
    }

    fn drive_elements(&mut self) -> ParseResult<Vec<DriveElementSpec>> {
        self.expect(&[TokenKind::LParen], "'(' to open a drive priority level")?;
        if !self.at(&[TokenKind::LParen])? {
            return self.error(format!(
                "expected '(' to open a drive element, found '{}'",
                self.found()
            ));
        }
        let mut elements = Vec::new();
        while self.at(&[TokenKind::LParen])? {
            elements.push(self.drive_element()?);
        }
        self.expect(&[TokenKind::RParen], "')' to end a drive priority level")?;
        Ok(elements)
    }

    fn drive_element(&mut self) -> ParseResult<DriveElementSpec> {
        self.expect(&[TokenKind::LParen], "'(' to open a drive element")?;
        let name = self.expect(&[TokenKind::Name], "a drive element name")?.text;
        let trigger = self.trigger_slot()?;
        let target = self
            .expect(
                &[TokenKind::Name],
                &format!("the target name of drive element '{name}'"),
            )?
            .text;

        let mut interval_ms = None;
        if self.at(&[TokenKind::Nil])? {
            self.skip();
        } else if self.at(&[TokenKind::LParen])? {
            self.skip();
            interval_ms = Some(self.freq()?);
        }

        self.opt_comment()?;
        self.expect(
            &[TokenKind::RParen],
            &format!("')' to end drive element '{name}'"),
        )?;
        Ok(DriveElementSpec {
            name,
            trigger,
            target,
            interval_ms,
        })
    }

    fn trigger_slot(&mut self) -> ParseResult<Option<Vec<SenseSpec>>> {
        if self.at(&[TokenKind::Nil])? {
            self.skip();
            Ok(None)
        } else if self.at(&[TokenKind::LParen])? {
            self.skip();
            self.trigger()
        } else {
            Ok(None)
        }
    }

    fn competence(&mut self) -> ParseResult<CompetenceSpec> {
        self.expect(&[TokenKind::C], "'C'")?;
        let name = self.expect(&[TokenKind::Name], "a competence name")?.text;

        let mut time_ms = None;
        let goal;
        if self.at(&[TokenKind::Nil])? {
            self.skip();
            goal = self.goal_slot(&name)?;
        } else {
            self.expect(
                &[TokenKind::LParen],
                &format!("'(' or 'nil' after competence name '{name}'"),
            )?;
            if self.at(&TIME_UNITS)? {
                time_ms = Some(self.time()?);
                goal = self.goal_slot(&name)?;
            } else if self.at(&[TokenKind::Goal])? {
                goal = self.goal()?;
                self.expect(&[TokenKind::LParen], &format!("'(' after the goal of '{name}'"))?;
            } else {
                goal = None;
            }
        }

        self.expect(&[TokenKind::Elements], &format!("'elements' in competence '{name}'"))?;
        let mut priorities = Vec::new();
        if !self.at(&[TokenKind::LParen])? {
            return self.error(format!(
                "expected '(' to open a competence priority level in '{name}', found '{}'",
                self.found()
            ));
        }
        while self.at(&[TokenKind::LParen])? {
            priorities.push(self.competence_elements(&name)?);
        }
        self.expect(
            &[TokenKind::RParen],
            &format!("')' to end the elements of competence '{name}'"),
        )?;
        self.opt_comment()?;
        self.expect(&[TokenKind::RParen], &format!("')' to end competence '{name}'"))?;

        Ok(CompetenceSpec {
            name,
            time_ms,
            goal,
            priorities,
        })
    }

    fn competence_elements(&mut self, competence: &str) -> ParseResult<Vec<CompetenceElementSpec>> {
        self.expect(&[TokenKind::LParen], "'(' to open a competence priority level")?;
        if !self.at(&[TokenKind::LParen])? {
            return self.error(format!(
                "expected '(' to open a competence element in '{competence}', found '{}'",
                self.found()
            ));
        }
        let mut elements = Vec::new();
        while self.at(&[TokenKind::LParen])? {
            elements.push(self.competence_element(competence)?);
        }
        self.expect(&[TokenKind::RParen], "')' to end a competence priority level")?;
        Ok(elements)
    }

    fn competence_element(&mut self, competence: &str) -> ParseResult<CompetenceElementSpec> {
        self.expect(&[TokenKind::LParen], "'(' to open a competence element")?;
        let name = self.expect(&[TokenKind::Name], "a competence element name")?.text;
        let trigger = self.trigger_slot()?;
        let target = self
            .expect(
                &[TokenKind::Name],
                &format!("the target name of element '{name}' in competence '{competence}'"),
            )?
            .text;

        let mut max_retries = -1;
        if self.at(&[TokenKind::Nil])? {
            self.skip();
        } else if self.at(&[TokenKind::NumInt])? {
            let token = self.expect(&[TokenKind::NumInt], "a retry count")?;
            max_retries = match token.text.parse::<i64>() {
                Ok(n) => n,
                Err(_) => {
                    return self.error(format!(
                        "retry count '{}' of element '{name}' is out of range",
                        token.text
                    ));
                }
            };
        }

        self.opt_comment()?;
        self.expect(
            &[TokenKind::RParen],
            &format!("')' to end element '{name}' in competence '{competence}'"),
        )?;
        Ok(CompetenceElementSpec {
            name,
            trigger,
            target,
            max_retries,
        })
    }

    fn action_pattern(&mut self) -> ParseResult<ActionPatternSpec> {
        self.expect(&[TokenKind::Ap], "'AP'")?;
        let name = self.expect(&[TokenKind::Name], "an action pattern name")?.text;

        let mut time_ms = None;
        if self.at(&[TokenKind::Nil])? {
            self.skip();
            self.expect(
                &[TokenKind::LParen],
                &format!("'(' after 'nil' in action pattern '{name}'"),
            )?;
        } else if self.at(&[TokenKind::LParen])? {
            self.skip();
            if self.at(&TIME_UNITS)? {
                time_ms = Some(self.time()?);
                self.expect(
                    &[TokenKind::LParen],
                    &format!("'(' after the time of action pattern '{name}'"),
                )?;
            }
        } else {
            return self.error(format!(
                "expected '(' or 'nil' after action pattern name '{name}', found '{}'",
                self.found()
            ));
        }

        if !self.at(&[TokenKind::LParen, TokenKind::Name])? {
            return self.error(format!(
                "expected an action pattern step in '{name}', found '{}'",
                self.found()
            ));
        }
        let mut steps = Vec::new();
        while self.at(&[TokenKind::Name, TokenKind::LParen])? {
            if self.at(&[TokenKind::LParen])? {
                let (sense, value, predicate) = self.full_sense()?;
                steps.push(PatternStepSpec::Sense {
                    name: sense,
                    value,
                    predicate,
                });
            } else {
                let token = self.expect(&[TokenKind::Name], "a step name")?;
                steps.push(PatternStepSpec::Named { name: token.text });
            }
        }
        self.expect(
            &[TokenKind::RParen],
            &format!("')' to end the steps of action pattern '{name}'"),
        )?;

        self.opt_comment()?;
        self.expect(
            &[TokenKind::RParen],
            &format!("')' to end action pattern '{name}'"),
        )?;
        Ok(ActionPatternSpec {
            name,
            time_ms,
            steps,
        })
    }

    fn goal(&mut self) -> ParseResult<Option<Vec<SenseSpec>>> {
        self.expect(&[TokenKind::Goal], "'goal'")?;
        let senses = self.senses()?;
        self.expect(&[TokenKind::RParen], "')' to end the goal")?;
        Ok(Some(senses).filter(|s| !s.is_empty()))
    }

    fn trigger(&mut self) -> ParseResult<Option<Vec<SenseSpec>>> {
        self.expect(&[TokenKind::Trigger], "'trigger'")?;
        let senses = self.senses()?;
        self.expect(&[TokenKind::RParen], "')' to end the trigger")?;
        Ok(Some(senses).filter(|s| !s.is_empty()))
    }

    fn senses(&mut self) -> ParseResult<Vec<SenseSpec>> {
        if self.at(&[TokenKind::Nil])? {
            self.skip();
            return Ok(Vec::new());
        }
        self.expect(&[TokenKind::LParen], "'(' or 'nil' to open a sense list")?;
        let mut senses = Vec::new();
        loop {
            match self.peek()? {
                TokenKind::RParen => break,
                TokenKind::Name => {
                    let token = self.expect(&[TokenKind::Name], "a sense name")?;
                    senses.push(SenseSpec::SenseAct { name: token.text });
                }
                TokenKind::LParen => {
                    let (name, value, predicate) = self.full_sense()?;
                    senses.push(SenseSpec::Check {
                        name,
                        value,
                        predicate,
                    });
                }
                _ => {
                    return self.error(format!(
                        "expected a sense name or '(', found '{}'",
                        self.found()
                    ));
                }
            }
        }
        self.skip();
        Ok(senses)
    }

    fn full_sense(&mut self) -> ParseResult<(String, Option<String>, Option<String>)> {
        self.expect(&[TokenKind::LParen], "'(' to open a sense")?;
        let name = self.expect(&[TokenKind::Name], "a sense name")?.text;
        let mut value = None;
        let mut predicate = None;
        if !self.at(&[TokenKind::RParen])? {
            value = Some(self.expect(&VALUE_KINDS, "a sense value")?.text);
            if !self.at(&[TokenKind::RParen])? {
                predicate = Some(self.expect(&[TokenKind::Predicate], "a comparison operator")?.text);
            }
        }
        self.expect(&[TokenKind::RParen], &format!("')' to end sense '{name}'"))?;
        Ok((name, value, predicate))
    }

    /// `unit number ')'`, converted to milliseconds.
    fn time(&mut self) -> ParseResult<i64> {
        let unit = self.expect(&TIME_UNITS, "a time unit")?.kind;
        let value = self.numfloat()?;
        self.expect(&[TokenKind::RParen], "')' to end the time")?;
        self.to_millis(unit, value)
    }

    /// Like `time`, but also accepts rates (`hz`, `pm`) as periods.
    fn freq(&mut self) -> ParseResult<i64> {
        let unit = self.expect(&FREQ_UNITS, "a frequency unit")?.kind;
        let value = self.numfloat()?;
        self.expect(&[TokenKind::RParen], "')' to end the frequency")?;
        self.to_millis(unit, value)
    }

    fn to_millis(&self, unit: TokenKind, value: f64) -> ParseResult<i64> {
        let millis = match unit {
            TokenKind::Hours => 3_600_000.0 * value,
            TokenKind::Minutes => 60_000.0 * value,
            TokenKind::Seconds => 1_000.0 * value,
            TokenKind::Hz | TokenKind::Pm if value == 0.0 => {
                return self.error("a frequency of zero has no period");
            }
            TokenKind::Hz => 1_000.0 / value,
            TokenKind::Pm => 60_000.0 / value,
            _ => value,
        };
        Ok(millis as i64)
    }

    fn numfloat(&mut self) -> ParseResult<f64> {
        let token = self.expect(&[TokenKind::NumInt, TokenKind::NumFloat], "a number")?;
        match token.text.parse::<f64>() {
            Ok(value) => Ok(value),
            Err(_) => self.error(format!("'{}' is not a valid number", token.text)),
        }
    }

    fn opt_comment(&mut self) -> ParseResult<()> {
        if self.at(&[TokenKind::Comment])? {
            self.skip();
        }
        Ok(())
    }
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> PlanSource {
        parse_plan(source).expect("plan should parse")
    }

    fn parse_err(source: &str) -> SyntaxError {
        parse_plan(source).expect_err("plan should be rejected")
    }

    #[test]
    fn minimal_drive_collection() {
        let plan = parse("((SDC d nil (drives ((e1 nil doThing nil)))))");
        let dc = plan.drive_collection.expect("drive collection");
        assert_eq!(dc.kind, "SDC");
        assert_eq!(dc.name, "d");
        assert_eq!(dc.goal, None);
        assert_eq!(dc.priorities.len(), 1);
        assert_eq!(dc.priorities[0][0].target, "doThing");
        assert_eq!(dc.priorities[0][0].interval_ms, None);
    }

    #[test]
    fn optional_slots_may_be_omitted() {
        let plan = parse(
            "((SDC d (goal ((done 1 ==))) (drives ((e1 act) (e2 (trigger (hungry)) eat (hz 4)))))
              (C c (elements ((ce1 a1))))
              (AP p (a1 a2)))",
        );
        let dc = plan.drive_collection.expect("drive collection");
        assert_eq!(
            dc.goal,
            Some(vec![SenseSpec::Check {
                name: "done".to_string(),
                value: Some("1".to_string()),
                predicate: Some("==".to_string()),
            }])
        );
        assert_eq!(dc.priorities[0].len(), 2);
        assert_eq!(dc.priorities[0][1].interval_ms, Some(250));
        assert_eq!(plan.competences[0].priorities[0][0].max_retries, -1);
        assert_eq!(plan.action_patterns[0].time_ms, None);
        assert_eq!(plan.action_patterns[0].steps.len(), 2);
    }

    #[test]
    fn competence_time_and_goal_forms() {
        for (source, time, has_goal) in [
            ("(C c nil nil (elements ((e nil a 2))))", None, false),
            ("(C c nil (goal (g)) (elements ((e nil a 2))))", None, true),
            ("(C c (seconds 2) nil (elements ((e nil a 2))))", Some(2000), false),
            ("(C c (minutes 1) (goal (g)) (elements ((e nil a 2))))", Some(60_000), true),
            ("(C c (goal (g)) (elements ((e nil a 2))))", None, true),
            ("(C c (hours 0.5) (elements ((e nil a 2))))", Some(1_800_000), false),
        ] {
            let plan = parse(&format!("({source})"));
            let competence = &plan.competences[0];
            assert_eq!(competence.time_ms, time, "{source}");
            assert_eq!(competence.goal.is_some(), has_goal, "{source}");
            assert_eq!(competence.priorities[0][0].max_retries, 2, "{source}");
        }
    }

    #[test]
    fn frequencies_convert_to_periods() {
        let plan = parse(
            "((SDC d nil (drives ((a nil x (pm 30)) (b nil x (none 7.9)) (c nil x (seconds .5))))))",
        );
        let level = &plan.drive_collection.expect("dc").priorities[0];
        let periods: Vec<Option<i64>> = level.iter().map(|e| e.interval_ms).collect();
        assert_eq!(periods, vec![Some(2000), Some(7), Some(500)]);
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let err = parse_err("((SDC d nil (drives ((a nil x (hz 0))))))");
        assert!(err.message.contains("zero"));
    }

    #[test]
    fn retry_count_overflow_is_rejected() {
        let err = parse_err("((C c nil nil (elements ((e nil a 99999999999999999999)))))");
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn docstring_is_unquoted_and_must_come_first() {
        let plan = parse(
            "((documentation \"title\" \"me\" \"notes\") (SDC d nil (drives ((e nil a)))))",
        );
        let doc = plan.docstring.expect("docstring");
        assert_eq!(doc.title, "title");
        assert_eq!(doc.memo, "notes");

        let err = parse_err(
            "((SDC d nil (drives ((e nil a)))) (documentation \"a\" \"b\" \"c\"))",
        );
        assert!(err.message.contains("first"));
    }

    #[test]
    fn structural_errors() {
        let err = parse_err("((SDC d nil (drives ((e nil a)))) (SDC e nil (drives ((e nil a)))))");
        assert!(err.message.contains("single drive collection"));

        let err = parse_err("((C a nil nil (elements ((e nil x)))) (AP b nil (x)))");
        assert!(err.message.contains("exactly one"));

        let err = parse_err("((AP b nil (x))) extra");
        assert!(err.message.contains("'extra'"));
    }

    #[test]
    fn end_of_input_reports_last_line() {
        let err = parse_err("(\n(SDC d nil\n(drives ((e nil a)");
        assert_eq!(err.line, 3);
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn error_display_has_line_prefix() {
        let err = parse_err("(\n\n(AP 12 nil (x)))");
        assert!(err.to_string().starts_with("Line 3: "), "{err}");
    }

    #[test]
    fn canonical_rendering_round_trips() {
        let source = "((documentation \"t\" \"a\" \"m\")
            (C fight (seconds 1) (goal ((enemy-dead true))) (elements
                ((hit (trigger ((ammo 0 >) close)) shoot 3))
                ((flee nil run-away))))
            (AP run-away (minutes 0.1) (turn (path-clear) step fight))
            (SRDC life (goal (won)) (drives
                ((combat (trigger ((enemy 'visible ==))) fight (hz 10)) (idle nil wander))
                ((rest nil sleep nil)))))";
        let first = parse(source);
        let second = parse(&first.to_string());
        assert_eq!(first, second);
    }
}
