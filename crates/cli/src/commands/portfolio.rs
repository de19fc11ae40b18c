use gigbook_core::domain::party::PartyId;
use gigbook_core::settlement::PortfolioFilter;
use gigbook_engine::RequestContext;

use crate::commands::{run_with_app, CommandResult};

pub fn run(perspective: &str, filter: &str) -> CommandResult {
    let Some(filter) = PortfolioFilter::parse(filter) else {
        return CommandResult::failure(
            "portfolio",
            "bad_request",
            format!("unknown filter `{filter}` (expected all|income|expense)"),
            2,
        );
    };
    let perspective = PartyId::new(perspective.trim());

    run_with_app("portfolio", "portfolio settled", |app, correlation_id| async move {
        let request = RequestContext::with_correlation_id(perspective, correlation_id);
        app.engine.settlement.portfolio(&request, filter).await
    })
}
