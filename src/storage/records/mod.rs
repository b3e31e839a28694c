pub mod resume;
pub mod user;

pub(crate) use resume::ResumeRecord;
pub(crate) use user::UserRecord;
