use std::io::{self, Write};

use anyhow::Result;
use kb_core::{EvalSummary, KnowledgeEntry, ResolutionOutcome};
use serde::Serialize;

use crate::cli::OutputFormat;

pub fn print_outcome(format: OutputFormat, outcome: &ResolutionOutcome) -> Result<()> {
    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Text => write_outcome_text(&mut out, outcome)?,
        OutputFormat::Json => {
            let mut value = serde_json::to_value(outcome)?;
            value["message"] = serde_json::Value::from(outcome.message());
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        }
    }
    Ok(())
}

fn write_outcome_text(out: &mut impl Write, outcome: &ResolutionOutcome) -> io::Result<()> {
    let kind = serde_json::to_value(outcome.kind())
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    writeln!(
        out,
        "outcome={} intent={} confidence={:.4}",
        kind,
        outcome.intent().unwrap_or("null"),
        outcome.confidence()
    )?;
    match outcome {
        ResolutionOutcome::Resolved { answer, .. } => writeln!(out, "answer={answer}"),
        other => writeln!(out, "message={}", other.message()),
    }
}

pub fn print_entries(format: OutputFormat, entries: &[KnowledgeEntry]) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let mut out = io::stdout().lock();
            for entry in entries {
                write_entry_text(&mut out, entry)?;
            }
            Ok(())
        }
        OutputFormat::Json => print_json(&entries),
    }
}

pub fn print_entry(format: OutputFormat, entry: &KnowledgeEntry) -> Result<()> {
    match format {
        OutputFormat::Text => {
            write_entry_text(&mut io::stdout().lock(), entry)?;
            Ok(())
        }
        OutputFormat::Json => print_json(entry),
    }
}

fn write_entry_text(out: &mut impl Write, entry: &KnowledgeEntry) -> io::Result<()> {
    writeln!(
        out,
        "id={} intent={} active={} faq={} category={} question={:?} answer={:?}",
        entry.id,
        entry.intent,
        entry.is_active,
        entry.is_faq,
        entry.faq_category.as_deref().unwrap_or("null"),
        entry.question,
        entry.answer
    )
}

pub fn print_summary(
    format: OutputFormat,
    summary: &EvalSummary,
    required_pass_rate: f32,
) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(summary);
    }

    let mut out = io::stdout().lock();
    writeln!(
        out,
        "total={} passed={} failed={} pass_rate={:.4} required={:.4} meets_threshold={}",
        summary.total,
        summary.passed,
        summary.failed,
        summary.pass_rate,
        required_pass_rate,
        summary.meets(required_pass_rate)
    )?;
    for o in &summary.outcomes {
        writeln!(
            out,
            "case={} passed={} outcome={:?} intent={} confidence={:.4} latency={:.1}ms",
            o.case_id,
            o.passed,
            o.actual,
            o.actual_intent.as_deref().unwrap_or("null"),
            o.confidence,
            o.latency_ms
        )?;
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(outcome: &ResolutionOutcome) -> String {
        let mut buf = Vec::new();
        write_outcome_text(&mut buf, outcome).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn resolved_text_prints_answer() {
        let text = render(&ResolutionOutcome::Resolved {
            answer: "Move the map...".to_string(),
            intent: "map_usage".to_string(),
            confidence: 0.93,
        });
        assert_eq!(
            text,
            "outcome=resolved intent=map_usage confidence=0.9300\nanswer=Move the map...\n"
        );
    }

    #[test]
    fn empty_input_text_prints_guidance() {
        let text = render(&ResolutionOutcome::EmptyInput);
        assert!(text.starts_with("outcome=empty_input intent=null confidence=0.0000\n"));
        assert!(text.contains("message=Please type a question"));
    }
}
