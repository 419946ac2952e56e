use fmm_tree::driver::FmmDriver;
use fmm_tree::kernel::CoulombKernel;
use fmm_tree::types::body::{Bodies, Body};
use fmm_tree::Config;

use mpi::traits::*;

use rand::distributions::Uniform;
use rand::prelude::*;
use rand::SeedableRng;

const NBODIES: usize = 10_000;

/// A cube of uniformly distributed unit-charge bodies, seeded so every rank starts from
/// the same global point set before `Partition` splits it up.
fn bodies_fixture() -> Bodies {
    let mut rng = StdRng::seed_from_u64(0);
    let between = Uniform::from(-1.0..1.0);

    (0..NBODIES)
        .map(|i| {
            let mut body = Body::default();
            body.x = [between.sample(&mut rng), between.sample(&mut rng), between.sample(&mut rng)];
            body.src = 1.0;
            body.ibody = i;
            body
        })
        .collect()
}

fn main() {
    let universe = mpi::initialize().unwrap();
    let world = universe.world();
    let comm = world.duplicate();

    let config = Config::default();
    let mut driver = FmmDriver::new(comm, config, Box::new(CoulombKernel));

    let bodies = if world.rank() == 0 { bodies_fixture() } else { Vec::new() };

    let local_bodies = driver.partition(bodies, 0.0).unwrap();
    let n_local = local_bodies.len();

    let result = driver.coulomb(local_bodies, 0.0).unwrap();

    match driver.verify(&result, 0.0, 0) {
        Ok(error) => {
            if world.rank() == 0 {
                println!("relative L2 error against direct sum: {:.3e}", error);
            }
        }
        Err(e) => eprintln!("rank {} verification failed: {}", world.rank(), e),
    }

    println!("rank {} owns {} bodies after partition", world.rank(), n_local);

    driver.finalize();
}
