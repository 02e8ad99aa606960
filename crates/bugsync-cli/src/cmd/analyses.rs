//! `bugsync analyses`: list the analyses the remote store knows about.

use anyhow::{Result, bail};
use bugsync_core::RemoteStore;
use bugsync_core::error::ErrorCode;
use bugsync_core::model::{Analysis, QueryParams};
use clap::Args;
use std::io::{self, Write};

use super::{SecretArgs, Session};
use crate::output::{CliError, OutputMode, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
pub struct AnalysesArgs {
    #[command(flatten)]
    pub secrets: SecretArgs,
}

pub fn run_analyses(args: &AnalysesArgs, output: OutputMode) -> Result<()> {
    let session = Session::open(&args.secrets, output)?;
    let analyses = match session.remote().list_analyses() {
        Ok(analyses) => analyses,
        Err(err) => {
            let message = format!("failed to list remote analyses: {err}");
            render_error(output, &CliError::with_code(&message, ErrorCode::ListAnalysesFailed))?;
            bail!(message);
        }
    };

    render_mode(
        output,
        &analyses,
        |analyses, w| print_text(analyses, w),
        |analyses, w| print_pretty(analyses, w),
    )
}

fn describe(params: &QueryParams) -> String {
    match params {
        QueryParams::Raw(raw) => raw.clone(),
        QueryParams::Fields(_) => params
            .pairs()
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&"),
    }
}

fn print_text(analyses: &[Analysis], w: &mut dyn Write) -> io::Result<()> {
    for analysis in analyses {
        writeln!(w, "{}\t{}\t{}", analysis.id, analysis.name, describe(&analysis.parameters))?;
    }
    Ok(())
}

fn print_pretty(analyses: &[Analysis], w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{} analyses", analyses.len()))?;
    for analysis in analyses {
        writeln!(w, "{:>6}  {}", analysis.id, analysis.name)?;
        writeln!(w, "        {}", describe(&analysis.parameters))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugsync_core::model::AnalysisId;
    use serde_json::json;

    #[test]
    fn field_parameters_are_described_as_a_query() {
        let params: QueryParams =
            serde_json::from_value(json!({"product": "Firefox", "status": ["NEW", "REOPENED"]}))
                .expect("params");
        assert_eq!(describe(&params), "product=Firefox&status=NEW&status=REOPENED");
    }

    #[test]
    fn text_rows_are_tab_separated() {
        let analyses = vec![Analysis {
            id: AnalysisId(4),
            name: "Beta".to_string(),
            parameters: QueryParams::Raw("f1=cf_status".to_string()),
        }];
        let mut buf = Vec::new();
        print_text(&analyses, &mut buf).expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "4\tBeta\tf1=cf_status\n");
    }
}
