//! Post-load decorators: hooks run over verified records before masking.

use crate::Ctx;

/// A post-load hook. Receives the execution context and every record that
/// survived verification; an error aborts the whole load.
pub trait LoadOption<E>: Send + Sync {
    fn apply(&self, ctx: &Ctx<'_>, records: &mut [E]) -> anyhow::Result<()>;
}

impl<E, F> LoadOption<E> for F
where
    F: Fn(&Ctx<'_>, &mut [E]) -> anyhow::Result<()> + Send + Sync,
{
    fn apply(&self, ctx: &Ctx<'_>, records: &mut [E]) -> anyhow::Result<()> {
        self(ctx, records)
    }
}

/// Pins a closure to the [`LoadOption`] signature so its arguments infer.
pub fn from_fn<E, F>(f: F) -> F
where
    F: Fn(&Ctx<'_>, &mut [E]) -> anyhow::Result<()> + Send + Sync,
{
    f
}

/// Run `options` in order. Nothing runs when `records` is empty.
pub fn apply_all<E>(
    ctx: &Ctx<'_>,
    options: &[&dyn LoadOption<E>],
    records: &mut [E],
) -> anyhow::Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    for option in options {
        ctx.ensure_active()?;
        option.apply(ctx, records)?;
    }
    Ok(())
}
