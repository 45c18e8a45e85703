//! Renders glTF scenes through OpenGL ES 3.0.
//!
//! A [`Scene`](scene::Scene) is uploaded once into a [`Model`](model::Model):
//! accessors become buffers, textures are decoded and uploaded, and every
//! primitive gets a shader variant picked by the attributes and textures it
//! has. [`Instance`](instance::Instance)s place a model in the world and play
//! its animations. All GPU access goes through the [`Device`](device::Device)
//! trait, which has a GLES backend and a headless one.

pub mod animation;
pub mod application;
pub mod device;
pub mod error;
pub mod instance;
pub mod model;
pub mod scene;
pub mod shader;
pub mod view;

pub use application::{Application, InstanceId};
pub use error::Error;
pub use model::{BuildOptions, Model};
