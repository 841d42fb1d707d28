pub mod cellular;
pub mod compositor;
pub mod error_codes;
pub mod export;
pub mod field;
pub mod glyph;
pub mod interaction;
pub mod painter;
pub mod render;
pub mod scene;
pub mod schema;
pub mod text_frame;
pub mod voronoi;
