mod coupled;
mod kronecker;
mod parallel_assembly;
mod transpose;
