pub mod verification_cleanup;

pub use verification_cleanup::VerificationCleanupWorker;
