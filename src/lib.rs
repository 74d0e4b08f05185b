pub use playur_core::*;

#[cfg(feature = "client")]
pub mod client {
    pub use playur_client::*;
}

#[cfg(feature = "codegen")]
pub mod codegen {
    pub use playur_codegen::*;
}

#[cfg(feature = "pipeline")]
pub mod pipeline {
    pub use playur_pipeline::*;
}

#[cfg(feature = "login")]
pub mod login {
    pub use playur_login::*;
}

#[cfg(feature = "mock_server")]
pub mod mock_server {
    pub use playur_mock_server::*;
}

pub mod prelude {
    pub use playur_core::prelude::*;

    #[cfg(feature = "client")]
    pub use playur_client::{ApiResponse, PlayurClient, PlayurClientError};

    #[cfg(feature = "codegen")]
    pub use playur_codegen::{EnumGenerator, GenerationReport, RecordSource};

    #[cfg(feature = "pipeline")]
    pub use playur_pipeline::{
        BuildUploadPipeline, CommandBuildSystem, FixedBranch, PipelineMode, PipelineOutcome,
        PipelineRequest, PipelineState, StdinBranchPrompt,
    };

    #[cfg(feature = "login")]
    pub use playur_login::{
        FileCredentialStore, FormResult, LoginController, MemoryCredentialStore, StartAction,
    };

    #[cfg(feature = "mock_server")]
    pub use playur_mock_server::prelude::*;
}
