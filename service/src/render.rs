//! File-based report renderer.
//!
//! Writes one plain-text report document per invocation into the output
//! directory, named `portfolio_report_<YYYYMMDD_HHMMSS>.txt`, and returns its
//! path.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;

use report_export_core::events::Portfolio;
use report_export_core::report::{RenderError, ReportRenderer};

/// Renders portfolio reports as plain-text files.
pub struct FileReportRenderer {
    output_dir: PathBuf,
}

impl FileReportRenderer {
    /// Create a renderer writing into `output_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Io`] if the directory cannot be created.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, RenderError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    fn compose(portfolios: &[Portfolio]) -> String {
        let mut report = String::new();
        report.push_str("Portfolio Report\n");
        report.push_str(&format!(
            "Generated on {}\n",
            Local::now().format("%B %-d, %Y")
        ));
        report.push_str(&"-".repeat(72));
        report.push('\n');
        report.push_str(&format!(
            "{:<6} {:<28} {:<12} {:<20} {:<20}\n",
            "ID", "Name", "User", "Created", "Last Update"
        ));
        for portfolio in portfolios {
            report.push_str(&format!(
                "{:<6} {:<28} {:<12} {:<20} {:<20}\n",
                portfolio.port_id,
                portfolio.name,
                portfolio.user_id,
                portfolio.created_at,
                portfolio.last_update
            ));
        }
        report.push_str(&"-".repeat(72));
        report.push_str(&format!("\n{} portfolios\n", portfolios.len()));
        report
    }
}

#[async_trait]
impl ReportRenderer for FileReportRenderer {
    async fn render_portfolio_report(
        &self,
        portfolios: &[Portfolio],
    ) -> Result<PathBuf, RenderError> {
        let file_name = format!(
            "portfolio_report_{}.txt",
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.output_dir.join(file_name);

        tokio::fs::write(&path, Self::compose(portfolios)).await?;
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use report_export_core::events::sample_portfolios;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "report-export-{name}-{}-{}",
            std::process::id(),
            Local::now().format("%H%M%S%f")
        ))
    }

    #[tokio::test]
    async fn report_file_mentions_every_portfolio() {
        let dir = scratch_dir("render");
        let renderer = FileReportRenderer::new(&dir).unwrap();
        let portfolios = sample_portfolios();

        let path = renderer.render_portfolio_report(&portfolios).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();

        for portfolio in &portfolios {
            assert!(content.contains(&portfolio.name));
            assert!(content.contains(&portfolio.user_id));
        }
        assert!(content.contains("3 portfolios"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn constructor_creates_the_output_directory() {
        let dir = scratch_dir("mkdir").join("nested");
        let _renderer = FileReportRenderer::new(&dir).unwrap();
        assert!(dir.is_dir());
        std::fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }
}
