use candle_core::{Result, Tensor};

/// A generator that maps latent vectors to images
pub trait GeneratorModuleT {
    /// * `z_nk` - latent batch (n x k)
    ///
    /// # Returns
    /// image batch (n x c x h x w) in the normalized [-1, 1] range
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor>;

    fn dim_latent(&self) -> usize;

    fn dim_image(&self) -> usize;
}

/// A discriminator built as an autoencoder: the bottleneck doubles as the
/// encoder of real images into the latent space.
pub trait DiscriminatorModuleT {
    /// # Arguments
    /// * `x_nchw` - image batch in the normalized [-1, 1] range
    ///
    /// # Returns `(recon_nchw, z_nk)`
    /// * `recon_nchw` - reconstruction, same shape and range as the input
    /// * `z_nk` - latent code (n x k)
    fn forward(&self, x_nchw: &Tensor) -> Result<(Tensor, Tensor)>;

    /// Encoder half only
    fn encode(&self, x_nchw: &Tensor) -> Result<Tensor>;

    /// Reconstruction head only
    fn decode(&self, z_nk: &Tensor) -> Result<Tensor>;

    fn dim_latent(&self) -> usize;

    fn dim_image(&self) -> usize;
}
