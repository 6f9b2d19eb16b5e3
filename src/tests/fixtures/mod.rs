pub mod commits;
pub mod github_stub;
pub mod timestamps;
pub mod watermarks;
