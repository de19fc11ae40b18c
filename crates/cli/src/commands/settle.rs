use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::ProjectId;
use gigbook_engine::RequestContext;

use crate::commands::{run_with_app, CommandResult};

pub fn run(project_id: &str, perspective: &str) -> CommandResult {
    let project_id = ProjectId(project_id.trim().to_string());
    let perspective = PartyId::new(perspective.trim());

    run_with_app("settle", "project settled", |app, correlation_id| async move {
        let request = RequestContext::with_correlation_id(perspective, correlation_id);
        app.engine.settlement.settle(&request, &project_id).await
    })
}
