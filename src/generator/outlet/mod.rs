use crate::generator::state::ResearchState;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// 保存最终报告
pub async fn save(output_path: &Path, state: &ResearchState) -> Result<PathBuf> {
    let outlet = DiskOutlet::new(output_path);
    outlet.save(state).await
}

pub trait Outlet {
    async fn save(&self, state: &ResearchState) -> Result<PathBuf>;
}

pub struct DiskOutlet {
    output_path: PathBuf,
}

impl DiskOutlet {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

impl Outlet for DiskOutlet {
    async fn save(&self, state: &ResearchState) -> Result<PathBuf> {
        println!("\n🖊️ 报告存储中...");
        let Some(final_report) = state.final_report.as_deref() else {
            anyhow::bail!("final report is missing, nothing to save");
        };

        // 确保父目录存在
        if let Some(parent_dir) = self.output_path.parent()
            && !parent_dir.as_os_str().is_empty()
            && !parent_dir.exists()
        {
            fs::create_dir_all(parent_dir)?;
        }

        fs::write(&self.output_path, final_report).with_context(|| {
            format!("Failed to write report to {}", self.output_path.display())
        })?;

        println!("💾 已保存报告: {}", self.output_path.display());
        Ok(self.output_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("report.md");
        let mut state = ResearchState::new("Cats", 1);
        state.final_report = Some("# Report".to_string());

        let written = save(&path, &state).await.unwrap();
        assert_eq!(written, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Report");
    }

    #[tokio::test]
    async fn test_missing_report_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.md");
        let state = ResearchState::new("Cats", 1);

        assert!(DiskOutlet::new(&path).save(&state).await.is_err());
        assert!(!path.exists());
    }
}
