//! Structured document analysis.

use std::path::Path;

use console::style;
use serde_json::json;

use paperlens::config::Config;
use paperlens::llm::{BackendError, InferenceError};
use paperlens::models::AnalysisRecord;
use paperlens::services::{AnalysisError, DocumentAnalysis, DocumentAnalyzer};

use crate::cli::style as marks;

/// Build the analyzer, refusing when analysis is switched off.
pub(super) fn analyzer(config: &Config) -> anyhow::Result<DocumentAnalyzer> {
    if !config.llm.enabled {
        anyhow::bail!("AI analysis is disabled (set llm.enabled = true in the config file)");
    }
    Ok(DocumentAnalyzer::from_config(&config.llm_config())?)
}

/// Print an analysis failure with whatever hint the backend gave.
pub(super) fn print_analysis_error(err: &AnalysisError) {
    eprintln!("{} {}", marks::error(), err);

    if let AnalysisError::Inference { source, .. } = err {
        let backend_error = match source {
            InferenceError::SessionCreateFailed { source, .. }
            | InferenceError::InferenceFailed { source, .. } => source,
        };
        if let BackendError::NotReady { hint, .. } = backend_error {
            eprintln!("  {} {}", marks::dim_arrow(), hint);
        }
    }

    if let Some(raw) = err.raw_output() {
        eprintln!("\n{}", style("Raw model output:").dim());
        eprintln!("{}", raw);
    }
}

pub async fn cmd_analyze(config: &Config, file: &Path, json: bool) -> anyhow::Result<()> {
    let analyzer = analyzer(config)?;
    let result = analyzer.analyze_document(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(file, &result))?);
    } else {
        print_document(file, &result);
    }

    match &result.analysis {
        Ok(_) => Ok(()),
        Err(e) => {
            if !json {
                print_analysis_error(e);
            }
            anyhow::bail!("analysis failed");
        }
    }
}

fn to_json(file: &Path, result: &DocumentAnalysis) -> serde_json::Value {
    let document = &result.document;
    let (analysis, error) = match &result.analysis {
        Ok(record) => (json!(record), serde_json::Value::Null),
        Err(e) => (
            serde_json::Value::Null,
            json!({
                "message": e.to_string(),
                "routing": e.decision(),
                "rawOutput": e.raw_output(),
            }),
        ),
    };

    json!({
        "file": file.display().to_string(),
        "pageCount": document.page_count,
        "title": document.title,
        "author": document.author,
        "analysis": analysis,
        "error": error,
        "analyzedAt": result.analyzed_at.to_rfc3339(),
    })
}

fn print_document(file: &Path, result: &DocumentAnalysis) {
    let document = &result.document;
    println!(
        "\n{} {} ({} pages, {} chars)",
        marks::success(),
        style(file.display()).bold(),
        document.page_count,
        document.text.chars().count()
    );

    if let Ok(record) = &result.analysis {
        print_record(record);
    }
}

fn print_record(record: &AnalysisRecord) {
    println!("\n{}", style(&record.title).bold().underlined());
    if !record.authors.is_empty() {
        println!("{}", style(record.authors.join(", ")).dim());
    }

    println!("\n{}", style("Abstract").bold());
    println!("{}", record.abstract_text);

    if !record.key_findings.is_empty() {
        println!("\n{}", style("Key Findings").bold());
        for finding in &record.key_findings {
            println!("  • {}", finding);
        }
    }

    if !record.sections.is_empty() {
        println!("\n{}", style("Sections").bold());
        for section in &record.sections {
            println!("  {}", style(&section.heading).cyan());
            match &section.summary {
                Some(summary) => println!("    {}", summary),
                None => println!("    {}", section.content),
            }
        }
    }

    for (label, value) in [
        ("Methodology", &record.methodology),
        ("Conclusions", &record.conclusions),
    ] {
        if let Some(value) = value {
            println!("\n{}", style(label).bold());
            println!("{}", value);
        }
    }

    if let Some(references) = &record.references {
        if !references.is_empty() {
            println!("\n{}", style("References").bold());
            for reference in references {
                println!("  {} {}", marks::dim_arrow(), reference);
            }
        }
    }
}
