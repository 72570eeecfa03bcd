//! Output directory layout
//!
//! Every file the recorder produces lives under one root:
//!
//! ```text
//! output/
//! ├── rgb/rgb_{frame}.png
//! ├── depth_png/depth_{frame}.png
//! ├── depth_npy/depth_{frame}.npy
//! ├── segmentation/seg_{frame}.png
//! ├── segmentation_npy/seg_{frame}.npy
//! ├── dvs_npy/dvs_{frame}.npy
//! ├── radar_data/radar.csv
//! ├── gif_frames/frame_{frame}.png
//! ├── crash_clip.gif
//! └── final_velocity.txt
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use contracts::{SensorKind, SessionBlueprint};
use tracing::{debug, info};

use crate::error::{RecorderError, Result};

pub const RGB_DIR: &str = "rgb";
pub const DEPTH_PNG_DIR: &str = "depth_png";
pub const DEPTH_NPY_DIR: &str = "depth_npy";
pub const SEGMENTATION_DIR: &str = "segmentation";
pub const SEGMENTATION_NPY_DIR: &str = "segmentation_npy";
pub const DVS_NPY_DIR: &str = "dvs_npy";
pub const RADAR_DIR: &str = "radar_data";
pub const GIF_FRAMES_DIR: &str = "gif_frames";
pub const RADAR_CSV: &str = "radar.csv";

/// Paths of one recording session
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn rgb_frame(&self, frame: u64) -> PathBuf {
        self.dir(RGB_DIR).join(format!("rgb_{frame}.png"))
    }

    pub fn depth_png(&self, frame: u64) -> PathBuf {
        self.dir(DEPTH_PNG_DIR).join(format!("depth_{frame}.png"))
    }

    pub fn depth_npy(&self, frame: u64) -> PathBuf {
        self.dir(DEPTH_NPY_DIR).join(format!("depth_{frame}.npy"))
    }

    pub fn segmentation_png(&self, frame: u64) -> PathBuf {
        self.dir(SEGMENTATION_DIR).join(format!("seg_{frame}.png"))
    }

    pub fn segmentation_npy(&self, frame: u64) -> PathBuf {
        self.dir(SEGMENTATION_NPY_DIR).join(format!("seg_{frame}.npy"))
    }

    pub fn dvs_npy(&self, frame: u64) -> PathBuf {
        self.dir(DVS_NPY_DIR).join(format!("dvs_{frame}.npy"))
    }

    pub fn radar_csv(&self) -> PathBuf {
        self.dir(RADAR_DIR).join(RADAR_CSV)
    }

    pub fn gif_frame(&self, frame: u64) -> PathBuf {
        self.dir(GIF_FRAMES_DIR).join(format!("frame_{frame}.png"))
    }

    /// Root-level file such as the crash clip or the velocity log
    pub fn root_file(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Folders a session writes into, given its sensor rig
    pub fn required_folders(&self, blueprint: &SessionBlueprint) -> Vec<PathBuf> {
        let mut names = Vec::new();
        for sensor in &blueprint.sensors {
            let dirs: &[&str] = match sensor.kind {
                SensorKind::Rgb => &[RGB_DIR],
                SensorKind::Depth => &[DEPTH_PNG_DIR, DEPTH_NPY_DIR],
                SensorKind::SemanticSegmentation => &[SEGMENTATION_DIR, SEGMENTATION_NPY_DIR],
                SensorKind::Dvs => &[DVS_NPY_DIR],
                SensorKind::Radar => &[RADAR_DIR],
            };
            for dir in dirs {
                if !names.contains(dir) {
                    names.push(*dir);
                }
            }
        }
        if blueprint.needs_gif_frames() {
            names.push(GIF_FRAMES_DIR);
        }
        names.into_iter().map(|name| self.dir(name)).collect()
    }

    /// Delete and recreate every folder the session writes into
    ///
    /// Root-level files from a previous run are left in place; they are
    /// overwritten when the session produces them again.
    pub fn prepare(&self, blueprint: &SessionBlueprint) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.root).map_err(|e| RecorderError::io(&self.root, e))?;
        let folders = self.required_folders(blueprint);
        for folder in &folders {
            reset_folder(folder)?;
        }
        info!(root = %self.root.display(), folders = folders.len(), "output folders prepared");
        Ok(folders)
    }
}

/// Remove `path` with all its contents (if present) and create it empty
pub fn reset_folder(path: &Path) -> Result<()> {
    if path.exists() {
        debug!(path = %path.display(), "removing existing folder");
        fs::remove_dir_all(path).map_err(|e| RecorderError::io(path, e))?;
    }
    fs::create_dir_all(path).map_err(|e| RecorderError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reset_folder_removes_previous_files() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("rgb");
        fs::create_dir_all(target.join("nested")).unwrap();
        fs::write(target.join("rgb_1.png"), b"old").unwrap();
        fs::write(target.join("nested").join("x.bin"), b"old").unwrap();

        reset_folder(&target).unwrap();

        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }

    #[test]
    fn test_reset_folder_creates_missing() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a").join("b");
        reset_folder(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_full_session_folders() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("output"));
        let folders = layout.prepare(&SessionBlueprint::full()).unwrap();

        let names: Vec<_> = folders
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "rgb",
                "depth_png",
                "depth_npy",
                "segmentation",
                "segmentation_npy",
                "dvs_npy",
                "radar_data",
                "gif_frames"
            ]
        );
        assert!(folders.iter().all(|p| p.is_dir()));
    }

    #[test]
    fn test_basic_session_folders() {
        let layout = OutputLayout::new("output");
        let folders = layout.required_folders(&SessionBlueprint::basic());
        assert_eq!(folders.len(), 6);
        assert!(!folders.contains(&PathBuf::from("output").join(RADAR_DIR)));
        assert!(!folders.contains(&PathBuf::from("output").join(GIF_FRAMES_DIR)));
    }

    #[test]
    fn test_prepare_keeps_root_files() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        fs::write(layout.root_file("final_velocity.txt"), "old").unwrap();
        fs::create_dir_all(layout.dir(RGB_DIR)).unwrap();
        fs::write(layout.rgb_frame(3), b"old").unwrap();

        layout.prepare(&SessionBlueprint::full()).unwrap();

        assert!(layout.root_file("final_velocity.txt").exists());
        assert!(!layout.rgb_frame(3).exists());
    }

    #[test]
    fn test_file_names() {
        let layout = OutputLayout::new("out");
        assert_eq!(layout.rgb_frame(42), PathBuf::from("out/rgb/rgb_42.png"));
        assert_eq!(layout.depth_npy(7), PathBuf::from("out/depth_npy/depth_7.npy"));
        assert_eq!(
            layout.segmentation_png(7),
            PathBuf::from("out/segmentation/seg_7.png")
        );
        assert_eq!(layout.radar_csv(), PathBuf::from("out/radar_data/radar.csv"));
        assert_eq!(layout.gif_frame(9), PathBuf::from("out/gif_frames/frame_9.png"));
    }
}
