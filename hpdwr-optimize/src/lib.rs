/// Vector function traits and finite difference approximations
pub mod calculus;
/// Newton's method for nonlinear residual equations, with optional line search
pub mod newton;
