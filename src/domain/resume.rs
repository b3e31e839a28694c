use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_ACCENT_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    #[default]
    Classic,
    Minimal,
    Modern,
    MinimalImage,
}

impl Template {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Minimal => "minimal",
            Self::Modern => "modern",
            Self::MinimalImage => "minimal-image",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Self::Classic),
            "minimal" => Ok(Self::Minimal),
            "modern" => Ok(Self::Modern),
            "minimal-image" => Ok(Self::MinimalImage),
            other => Err(format!("unknown template: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub profession: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// Partial update of [`PersonalInfo`]; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfoPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub profession: Option<String>,
    pub linkedin: Option<String>,
    pub website: Option<String>,
}

impl PersonalInfoPatch {
    pub fn apply(self, info: &mut PersonalInfo) {
        if let Some(v) = self.full_name {
            info.full_name = v;
        }
        if let Some(v) = self.email {
            info.email = v;
        }
        if let Some(v) = self.phone {
            info.phone = v;
        }
        if let Some(v) = self.location {
            info.location = v;
        }
        if let Some(v) = self.profession {
            info.profession = v;
        }
        // An empty string clears the link.
        if let Some(v) = self.linkedin {
            info.linkedin = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = self.website {
            info.website = Some(v).filter(|s| !s.is_empty());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub field: String,
    pub graduation_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experience {
    pub company: String,
    pub position: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// The structured body of a resume, stored as a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeContent {
    pub personal_info: PersonalInfo,
    pub professional_summary: String,
    pub education: Vec<Education>,
    pub experience: Vec<Experience>,
    pub project: Vec<Project>,
    pub skills: Vec<String>,
}

impl ResumeContent {
    /// A current position never carries an end date.
    pub fn normalize(&mut self) {
        for job in &mut self.experience {
            if job.is_current {
                job.end_date = None;
            }
        }
        self.skills.retain(|s| !s.trim().is_empty());
    }
}

#[derive(Debug, Clone)]
pub struct Resume {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub public: bool,
    pub template: Template,
    pub accent_color: String,
    pub content: ResumeContent,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct ResumePatch {
    pub title: Option<String>,
    pub public: Option<bool>,
    pub template: Option<Template>,
    pub accent_color: Option<String>,
    pub personal_info: Option<PersonalInfoPatch>,
    pub professional_summary: Option<String>,
    pub education: Option<Vec<Education>>,
    pub experience: Option<Vec<Experience>>,
    pub project: Option<Vec<Project>>,
    pub skills: Option<Vec<String>>,
}

impl ResumePatch {
    pub fn apply(self, resume: &mut Resume) {
        if let Some(title) = self.title {
            resume.title = title;
        }
        if let Some(public) = self.public {
            resume.public = public;
        }
        if let Some(template) = self.template {
            resume.template = template;
        }
        if let Some(color) = self.accent_color {
            resume.accent_color = color;
        }
        if let Some(info) = self.personal_info {
            info.apply(&mut resume.content.personal_info);
        }
        if let Some(summary) = self.professional_summary {
            resume.content.professional_summary = summary;
        }
        if let Some(education) = self.education {
            resume.content.education = education;
        }
        if let Some(experience) = self.experience {
            resume.content.experience = experience;
        }
        if let Some(project) = self.project {
            resume.content.project = project;
        }
        if let Some(skills) = self.skills {
            resume.content.skills = skills;
        }
        resume.content.normalize();
    }
}

/// `#RGB` or `#RRGGBB`, case-insensitive.
#[must_use]
pub fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Which resume section a piece of text belongs to when asking for an AI rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhanceKind {
    Summary,
    ExperienceJobDescription,
    ProjectDescription,
}

impl EnhanceKind {
    #[must_use]
    pub const fn system_prompt(self) -> &'static str {
        match self {
            Self::Summary => {
                "You are an expert in resume writing. Enhance the professional summary of a resume. \
                 Keep it to 1-2 sentences highlighting key skills, experience and career objectives. \
                 Make it compelling and ATS-friendly. Return only the rewritten text."
            }
            Self::ExperienceJobDescription => {
                "You are an expert in resume writing. Enhance the job description of a resume in 1-2 sentences, \
                 highlighting key responsibilities and achievements with action verbs and quantifiable results \
                 where possible. Make it ATS-friendly. Return only the rewritten text."
            }
            Self::ProjectDescription => {
                "You are an expert in resume writing. Enhance the project description of a resume in 1-2 sentences, \
                 covering the project's purpose, key technologies, responsibilities and measurable impact. \
                 Use clear action verbs and keep it ATS-friendly. Return only the rewritten text."
            }
        }
    }

    #[must_use]
    pub fn user_prompt(self, text: &str) -> String {
        match self {
            Self::Summary => format!("Enhance my professional summary: {text}"),
            Self::ExperienceJobDescription => format!("Enhance this job description: {text}"),
            Self::ProjectDescription => format!("Enhance this project description: {text}"),
        }
    }
}
