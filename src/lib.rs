//! Exploration of finite element pairings for the stationary Stokes equations.
//!
//! A calculation is described by a [`config::Configuration`]: a mesh family, a velocity element,
//! a pressure element and a set of stabilization extras. The [`analysis::ConvergenceAnalyzer`]
//! solves a manufactured Stokes problem on a sequence of uniformly refined meshes and classifies
//! the pairing as stable, convergent and optimal based on the observed errors.
//!
//! The pipeline per refinement level is
//!
//! 1. [`mesh::builder::MeshBuilder`]: mesh and exact solution,
//! 2. [`space::SpacePairBuilder`]: velocity and pressure spaces,
//! 3. [`form::FormAssembler`]: bilinear and linear forms,
//! 4. [`solver::StokesSolver`]: sparse assembly and direct solve,
//! 5. [`error`]: error norms against the exact solution.

pub mod analysis;
pub mod assembly;
pub mod config;
pub mod element;
pub mod error;
pub mod exact;
pub mod form;
pub mod geometry;
pub mod io;
pub mod mesh;
pub mod quadrature;
pub mod score;
pub mod session;
pub mod solver;
pub mod space;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate vtkio;
