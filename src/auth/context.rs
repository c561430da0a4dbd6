/// Which participants a caller may see and touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Credentials not bound to a project
    AllProjects,
    /// Credentials bound to a single project
    Project(i64),
}

impl Scope {
    pub fn from_project_id(project_id: Option<i64>) -> Self {
        match project_id {
            Some(id) => Scope::Project(id),
            None => Scope::AllProjects,
        }
    }

    /// The project new participants should be linked to, if any
    pub fn project_id(&self) -> Option<i64> {
        match self {
            Scope::AllProjects => None,
            Scope::Project(id) => Some(*id),
        }
    }
}

/// Represents the authentication context for the current request
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Subject of the presented token
    pub subject: String,

    /// Visibility granted by the token
    pub scope: Scope,
}

impl AuthContext {
    /// Create a new authentication context
    pub fn new(subject: impl Into<String>, scope: Scope) -> Self {
        Self {
            subject: subject.into(),
            scope,
        }
    }
}
