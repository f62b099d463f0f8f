mod convergence;
mod fake;
mod scenario;
