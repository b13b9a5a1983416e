use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use recipe_errors::{LibError, LibResult};

use crate::{build_tool::BuildTool, vcs::Vcs};

pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        color_eyre::install().unwrap();
    });
}

fn unavailable(path: &Path, command: &str) -> LibError {
    LibError::VcsUnavailable {
        path: path.to_path_buf(),
        command: command.to_string(),
        message: "fake: no answer configured".to_string(),
    }
}

/// In-memory version control with scripted answers and a call log.
#[derive(Default)]
pub struct FakeVcs {
    pub root: Option<PathBuf>,
    pub tag: Option<String>,
    pub url_and_commit: Option<(String, String)>,
    pub dirty: bool,
    pub fail_clone: bool,
    pub head: RefCell<Option<String>>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeVcs {
    /// A repository rooted at `root`.
    pub fn repository(root: &Path, tag: &str, url: &str, commit: &str) -> Self {
        Self {
            root: Some(dunce::canonicalize(root).unwrap()),
            tag: Some(tag.to_string()),
            url_and_commit: Some((url.to_string(), commit.to_string())),
            ..Self::default()
        }
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.borrow().iter().any(|c| c == name)
    }

    fn log(&self, name: &str) {
        self.calls.borrow_mut().push(name.to_string());
    }
}

impl Vcs for FakeVcs {
    fn toplevel(&self, path: &Path) -> Result<PathBuf, LibError> {
        self.log("toplevel");
        self.root.clone().ok_or_else(|| unavailable(path, "toplevel"))
    }

    fn describe_tag(&self, path: &Path) -> Result<String, LibError> {
        self.log("describe_tag");
        self.tag.clone().ok_or_else(|| unavailable(path, "describe_tag"))
    }

    fn url_and_commit(&self, path: &Path) -> Result<(String, String), LibError> {
        self.log("url_and_commit");
        self.url_and_commit
            .clone()
            .ok_or_else(|| unavailable(path, "url_and_commit"))
    }

    fn is_dirty(&self, _path: &Path) -> Result<bool, LibError> {
        self.log("is_dirty");
        Ok(self.dirty)
    }

    fn clone_repo(&self, _url: &str, dest: &Path) -> Result<(), LibError> {
        self.log("clone_repo");
        if self.fail_clone {
            return Err(unavailable(dest, "clone_repo"));
        }
        std::fs::write(dest.join("CMakeLists.txt"), "project(fetched)\n").unwrap();
        Ok(())
    }

    fn checkout(&self, _dest: &Path, commit: &str) -> Result<(), LibError> {
        self.log("checkout");
        *self.head.borrow_mut() = Some(commit.to_string());
        Ok(())
    }

    fn head_commit(&self, path: &Path) -> Result<String, LibError> {
        self.head
            .borrow()
            .clone()
            .ok_or_else(|| unavailable(path, "head_commit"))
    }
}

#[derive(Debug, Default)]
pub struct ToolLog {
    pub defines: Vec<(String, String)>,
    pub steps: Vec<&'static str>,
}

/// Build tool that records what the stages asked of it.
#[derive(Debug, Default, Clone)]
pub struct RecordingTool {
    pub log: Rc<RefCell<ToolLog>>,
    pub fail_build: bool,
}

impl BuildTool for RecordingTool {
    fn define(&mut self, name: &str, value: &str) {
        self.log
            .borrow_mut()
            .defines
            .push((name.to_string(), value.to_string()));
    }

    fn generate(&self) -> LibResult<PathBuf> {
        self.log.borrow_mut().steps.push("generate");
        Ok(PathBuf::from("recipe_toolchain.cmake"))
    }

    fn configure(&self) -> LibResult<()> {
        self.log.borrow_mut().steps.push("configure");
        Ok(())
    }

    fn build(&self) -> LibResult<()> {
        self.log.borrow_mut().steps.push("build");
        if self.fail_build {
            return Err(LibError::BuildTool {
                step: "build".to_string(),
                message: "fake: compiler exploded".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn install(&self) -> LibResult<()> {
        self.log.borrow_mut().steps.push("install");
        Ok(())
    }
}
