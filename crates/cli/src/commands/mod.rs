pub(crate) mod heatmap;
pub(crate) mod ids;
pub(crate) mod simulate;
