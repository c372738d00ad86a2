//! Summaries and questions over a document's text.

use std::path::Path;

use paperlens::config::Config;
use paperlens::extract::{self, ExtractedDocument};
use paperlens::models::SummaryLength;

use super::analyze::{analyzer, print_analysis_error};

async fn extract_text(file: &Path) -> anyhow::Result<ExtractedDocument> {
    let extractor = extract::extractor_for(file)?;
    Ok(extractor.extract(file).await?)
}

pub async fn cmd_summarize(config: &Config, file: &Path, length: SummaryLength) -> anyhow::Result<()> {
    let analyzer = analyzer(config)?;
    let document = extract_text(file).await?;

    match analyzer.summarize(&document.text, length).await {
        Ok(summary) => {
            println!("{}", summary);
            Ok(())
        }
        Err(e) => {
            print_analysis_error(&e);
            anyhow::bail!("summarization failed");
        }
    }
}

pub async fn cmd_ask(config: &Config, file: &Path, question: &str) -> anyhow::Result<()> {
    let analyzer = analyzer(config)?;
    let document = extract_text(file).await?;

    match analyzer.answer(question, &document.text).await {
        Ok(answer) => {
            println!("{}", answer);
            Ok(())
        }
        Err(e) => {
            print_analysis_error(&e);
            anyhow::bail!("question could not be answered");
        }
    }
}
