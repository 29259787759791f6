pub mod began_autoencoder;
pub mod began_balance;
pub mod began_checkpoint;
pub mod began_config;
pub mod began_data_loader;
pub mod began_image_io;
pub mod began_image_pipeline;
pub mod began_inference;
pub mod began_interpolate;
pub mod began_model_traits;
pub mod began_networks;
pub mod began_trainer;

pub use candle_core;
pub use candle_nn;
