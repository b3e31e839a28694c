pub mod account_service;
pub mod auth_service;
pub mod health_service;
pub mod llm_client;
pub mod mail_service;
pub mod oauth_service;
pub mod resume_service;
pub mod token_service;
