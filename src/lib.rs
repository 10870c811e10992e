pub mod artifact;
pub mod basemap;
pub mod boundary;
pub mod compose;
pub mod config;
pub mod coord;
pub mod error;
pub mod extent;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod selection;

pub use artifact::{Artifact, ArtifactError, ArtifactWriter};
pub use basemap::{BasemapError, BasemapSource, HttpClient, TileProvider, UreqClient};
pub use boundary::{AdminLevel, AdministrativeUnit, BoundaryDataset, DataError, ReferenceLayers};
pub use compose::{Composition, Layout, MapComposer};
pub use config::{ConfigError, MapConfig};
pub use error::MapError;
pub use extent::{DEFAULT_MARGIN_DEG, Extent, ExtentError, compute_extent};
pub use pipeline::MapService;
pub use selection::{InsetPosition, MapRequest, Resolved, Selection, resolve, validate_hierarchy};
