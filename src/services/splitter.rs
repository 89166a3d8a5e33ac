//! Query normalization, splitting and sub-problem parsing.
//!
//! Turns raw query text into ordered [`SubProblem`]s:
//!
//! 1. [`normalize`] cleans line endings and whitespace.
//! 2. [`split_into_sub_problems`] cuts the text at newlines and at sentence
//!    boundaries that look like the start of a new question.
//! 3. [`parse_problem`] detects the operation, topic and variables of each
//!    fragment and assigns its route.
//!
//! All detection is keyword based (see [`super::patterns`]); ambiguous input
//! is surfaced through [`SubProblem::needs_clarification`], not resolved.

use super::patterns::{
    DETECTION_ORDER, HORIZONTAL_SPACE, IDENTIFIER, IMPERATIVE_START, OPERATION_SIGNALS,
    SENTENCE_BOUNDARY, TOPIC_SIGNALS,
};
use crate::extract::patterns::{AT_CLAUSE, DIFFERENTIAL_OPERATOR};
use crate::extract::{explicit_variable, extract_equations};
use crate::models::{Operation, ProblemRecord, SubProblem, Topic};
use crate::{Error, Result};
use std::collections::BTreeSet;

/// Fragments shorter than this (in characters, after trimming) are noise.
pub const MIN_FRAGMENT_LEN: usize = 3;

/// Single letters that are words or constants rather than variables.
const NON_VARIABLE_LETTERS: [&str; 4] = ["a", "A", "I", "e"];

/// Normalizes line endings and whitespace.
///
/// `\r\n` and `\r` become `\n`, runs of other whitespace collapse to one
/// space, lines are trimmed and empty lines dropped.
#[must_use]
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits raw text into atomic sub-problem texts, in order.
///
/// Splitting is idempotent: every returned fragment splits to itself.
///
/// # Examples
///
/// ```
/// use quantix::split_into_sub_problems;
///
/// let parts = split_into_sub_problems("Find the derivative of x^2. Solve x + 1 = 3.");
/// assert_eq!(parts, vec!["Find the derivative of x^2.", "Solve x + 1 = 3."]);
/// ```
#[must_use]
pub fn split_into_sub_problems(text: &str) -> Vec<String> {
    normalize(text)
        .lines()
        .flat_map(split_sentences)
        .filter(|fragment| fragment.chars().count() >= MIN_FRAGMENT_LEN)
        .collect()
}

/// Splits one line at boundaries followed by an imperative verb or a
/// capital letter. The boundary character stays with the preceding
/// fragment. A `.` inside a decimal number is never followed by whitespace,
/// so it never splits.
fn split_sentences(line: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(line) {
        if starts_new_question(&line[boundary.end()..]) {
            // Boundary characters are ASCII, so `start + 1` is a char boundary.
            fragments.push(line[start..=boundary.start()].trim().to_string());
            start = boundary.end();
        }
    }
    fragments.push(line[start..].trim().to_string());
    fragments
}

fn starts_new_question(rest: &str) -> bool {
    IMPERATIVE_START.is_match(rest) || rest.chars().next().is_some_and(char::is_uppercase)
}

/// Detects the operation named in `text`, most specific first.
#[must_use]
pub fn detect_operation(text: &str) -> Option<Operation> {
    let has_equation_list = extract_equations(&AT_CLAUSE.replace(text, "")).is_ok();

    DETECTION_ORDER.into_iter().find(|&operation| {
        let keyword = OPERATION_SIGNALS
            .iter()
            .any(|s| s.operation == operation && s.pattern.is_match(text));
        keyword || (operation == Operation::System && has_equation_list)
    })
}

/// Detects the topic, preferring the operation's own topic.
#[must_use]
pub fn detect_topic(text: &str, operation: Option<Operation>) -> Topic {
    if let Some(operation) = operation {
        return operation.topic();
    }
    TOPIC_SIGNALS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map_or(Topic::Unknown, |(_, topic)| *topic)
}

/// Collects single-letter variables mentioned in `text`.
///
/// Differential operators are removed first so `d/dx` contributes `x` but
/// not `d`. Letters directly followed by `(` are function names.
#[must_use]
pub fn detect_variables(text: &str) -> BTreeSet<String> {
    let cleaned = DIFFERENTIAL_OPERATOR.replace_all(text, " ");

    let mut variables: BTreeSet<String> = IDENTIFIER
        .find_iter(&cleaned)
        .filter(|m| {
            let token = m.as_str();
            token.len() == 1
                && !NON_VARIABLE_LETTERS.contains(&token)
                && !cleaned[m.end()..].starts_with('(')
                && !cleaned[..m.start()].ends_with('\'')
        })
        .map(|m| m.as_str().to_string())
        .collect();

    variables.extend(explicit_variable(text));
    variables
}

/// Parses one fragment into a [`SubProblem`].
#[must_use]
pub fn parse_problem(fragment: &str) -> SubProblem {
    let text = normalize(fragment);
    let operation = detect_operation(&text);
    let topic = detect_topic(&text, operation);
    let variables = detect_variables(&text);
    SubProblem::new(text, operation, topic, variables)
}

/// Splits and parses raw query text.
#[must_use]
pub fn parse_query(raw: &str) -> Vec<SubProblem> {
    split_into_sub_problems(raw)
        .iter()
        .map(|fragment| parse_problem(fragment))
        .collect()
}

/// Validates a record and parses it, honouring its operation and topic hints.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the problem text is blank or the
/// operation hint names no known operation.
pub fn parse_record(record: &ProblemRecord) -> Result<SubProblem> {
    let text = normalize(&record.problem_text);
    if text.is_empty() {
        return Err(Error::InvalidInput("problem_text is blank".to_string()));
    }

    let operation = match record.operation.as_deref().map(str::trim) {
        None | Some("") => detect_operation(&text),
        Some(hint) => Some(
            Operation::parse(hint)
                .ok_or_else(|| Error::InvalidInput(format!("unknown operation '{hint}'")))?,
        ),
    };

    let topic = record
        .topic
        .as_deref()
        .and_then(Topic::parse)
        .unwrap_or_else(|| detect_topic(&text, operation));

    let variables = detect_variables(&text);
    Ok(SubProblem::new(text, operation, topic, variables))
}
