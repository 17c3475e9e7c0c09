//! 业务能力层：描述"我能做什么"，每项能力只处理单个任务

pub mod code_runner;
pub mod downloader;
pub mod llm_service;
pub mod local_toolbox;
pub mod media;
pub mod solver_client;
pub mod submitter;
pub mod task_log_writer;

pub use code_runner::CodeRunner;
pub use downloader::Downloader;
pub use llm_service::LlmService;
pub use local_toolbox::LocalToolbox;
pub use media::MediaService;
pub use solver_client::{ChatModel, SolverClient};
pub use submitter::Submitter;
pub use task_log_writer::TaskLogWriter;
