//! Publications that serve each edition as a single file at a predictable URL.
//!
//! # URL Pattern
//!
//! ```text
//! https://www.ahmedabadexpress.com/newspaper-pdf/{date}.pdf
//! https://westerntimesnews.in/wp-content/uploads/{date:%Y}/{date:%m}/{date:%d%m%Y}{code}.pdf
//! ```

use super::{EditionRun, HarvestContext};
use crate::download::AssetTarget;
use crate::error::Result;
use crate::fetch::Fetch;
use tracing::{info, instrument};

/// Download the edition file; a missing file means no edition that day.
#[instrument(level = "info", skip_all, fields(edition = %run.edition().name))]
pub async fn harvest<F: Fetch>(ctx: &HarvestContext<'_, F>, run: &mut EditionRun, url: &str) -> Result<()> {
    let url = ctx.render_url(url, run.edition())?;
    run.download(ctx, &AssetTarget::edition(&url))
        .await
        .map_err(|e| ctx.missing_as_not_found(e))?;
    info!(%url, "Downloaded edition file");
    Ok(())
}
