mod commands;
mod paths;
mod system;

pub use commands::{Detach, HideWindow};
pub use paths::{CvmPaths, HOME_ENV, PathsError, executable_name};
pub use system::{
    is_executable, make_executable, path_entries, same_dir, system_bin_dirs,
};
