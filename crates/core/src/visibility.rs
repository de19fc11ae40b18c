use serde::{Deserialize, Serialize};

use crate::domain::party::PartyId;
use crate::domain::project::Project;

/// How much of a project's recruiting and money a viewer may see.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectView {
    Full,
    /// Role, fee and message of the viewer's own proposal, nothing aggregate.
    OwnProposalOnly,
    Hidden,
}

/// `brief_owner` is the owner of the project's parent brief, if any. Once a
/// derived project has a PM, its owner keeps full view only through owning
/// the brief.
pub fn project_visibility(
    project: &Project,
    brief_owner: Option<&PartyId>,
    viewer: &PartyId,
    viewer_has_proposal: bool,
) -> ProjectView {
    if project.is_pm(viewer) || brief_owner == Some(viewer) {
        return ProjectView::Full;
    }
    if &project.owner_id == viewer && (project.is_brief() || project.pm_performer_id.is_none()) {
        return ProjectView::Full;
    }
    if viewer_has_proposal {
        ProjectView::OwnProposalOnly
    } else {
        ProjectView::Hidden
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{project_visibility, ProjectView};
    use crate::domain::party::PartyId;
    use crate::domain::project::{Project, ProjectId, ProjectStatus, Visibility};

    fn derived(owner: &str, pm: Option<&str>) -> Project {
        Project {
            id: ProjectId("prj-1".to_owned()),
            owner_id: PartyId::new(owner),
            client_company_ref: None,
            pm_performer_id: pm.map(PartyId::new),
            parent_project_id: Some(ProjectId("brief-1".to_owned())),
            title: "Tour".to_owned(),
            category: None,
            description: None,
            visibility: Visibility::Public,
            start_date: None,
            end_date: None,
            schedule: Vec::new(),
            status: ProjectStatus::negotiating(),
            legacy_status: None,
            budget: None,
            contract_amount: Some(1_000_000),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_loses_view_once_pm_exists_unless_they_own_the_brief() {
        let brief_owner = PartyId::new("agency-1");
        let project = derived("owner-2", Some("dancer-a"));

        assert_eq!(
            project_visibility(&project, Some(&brief_owner), &PartyId::new("owner-2"), false),
            ProjectView::Hidden
        );
        assert_eq!(
            project_visibility(&project, Some(&brief_owner), &brief_owner, false),
            ProjectView::Full
        );
        assert_eq!(
            project_visibility(&derived("owner-2", None), Some(&brief_owner), &PartyId::new("owner-2"), false),
            ProjectView::Full
        );
    }

    #[test]
    fn pm_sees_everything_and_participants_see_their_own() {
        let project = derived("owner-1", Some("dancer-a"));

        assert_eq!(
            project_visibility(&project, None, &PartyId::new("dancer-a"), true),
            ProjectView::Full
        );
        assert_eq!(
            project_visibility(&project, None, &PartyId::new("dancer-b"), true),
            ProjectView::OwnProposalOnly
        );
        assert_eq!(
            project_visibility(&project, None, &PartyId::new("stranger"), false),
            ProjectView::Hidden
        );
    }
}
