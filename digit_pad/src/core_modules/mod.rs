pub mod block;
pub mod grid_reducer;
pub mod image_helper;
pub mod inference;
pub mod intensity;
pub mod linear_model;
pub mod model_input;
pub mod pixel;
pub mod surface;
