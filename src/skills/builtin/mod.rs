pub mod files;
pub mod run_bash;
pub mod run_python;

pub use files::{EditFileSkill, ListFilesSkill, ReadFileSkill, SearchFilesSkill, WriteFileSkill};
pub use run_bash::RunBashSkill;
pub use run_python::RunPythonSkill;
