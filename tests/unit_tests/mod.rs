mod analysis;
mod form;
mod geometry;
mod quadrature;
mod session;
mod solver;
mod space;
