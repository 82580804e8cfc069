use festokes::config::{Discretization, Extras, MeshFamily, PressureElement, VelocityElement};
use festokes::error::compute_errors;
use festokes::exact::ExactSolution;
use festokes::form::FormAssembler;
use festokes::mesh::builder::MeshBuilder;
use festokes::mesh::MeshLevel;
use festokes::solver::{DiscreteSolution, StokesSolver};
use festokes::space::{SpacePair, SpacePairBuilder};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DVector, Matrix2, Point2, Vector2};

fn taylor_hood(family: MeshFamily) -> Discretization {
    Discretization::new(family, VelocityElement::P2, PressureElement::P1, Extras::new())
}

fn setup(discretization: &Discretization, level: usize) -> (MeshLevel, ExactSolution, SpacePair) {
    let (mesh_level, exact) = MeshBuilder.build(discretization, level);
    let space = SpacePairBuilder.build(&mesh_level, discretization);
    (mesh_level, exact, space)
}

/// Coefficients of the nodal interpolant of the given fields in a continuous Lagrange pair.
fn interpolate<U, P>(space: &SpacePair, level: &MeshLevel, u: U, p: P) -> DVector<f64>
where
    U: Fn(&Point2<f64>) -> Vector2<f64>,
    P: Fn(&Point2<f64>) -> f64,
{
    let locations = space.dof_locations(level);
    DVector::from_iterator(
        space.num_dofs(),
        (0..space.num_dofs()).map(|dof| {
            if dof < space.pressure_offset() {
                u(&locations[dof])[dof % 2]
            } else {
                p(&locations[dof])
            }
        }),
    )
}

#[test]
fn continuous_lagrange_pairs_reproduce_linear_fields() {
    let u = |x: &Point2<f64>| Vector2::new(1.0 + 2.0 * x.x - x.y, 0.5 - 3.0 * x.x + 4.0 * x.y);
    let p = |x: &Point2<f64>| 2.0 - x.x + 0.5 * x.y;
    let gradient = Matrix2::new(2.0, -1.0, -3.0, 4.0);
    for (velocity, pressure) in [
        (VelocityElement::P2, PressureElement::P1),
        (VelocityElement::P3, PressureElement::P2),
    ] {
        let discretization = Discretization::new(MeshFamily::Unstructured, velocity, pressure, Extras::new());
        let (level, _, space) = setup(&discretization, 0);
        let solution = DiscreteSolution::new(&space, &level, interpolate(&space, &level, u, p));

        for element in 0..level.num_elements() {
            for xi in [Point2::new(0.2, 0.3), Point2::new(0.6, 0.1), Point2::new(0.05, 0.9)] {
                let geometry = level.geometry_point(element, &xi);
                let values = solution.evaluate(element, &xi, &geometry);
                assert_matrix_eq!(values.velocity, u(&geometry.point), comp = abs, tol = 1e-12);
                assert_matrix_eq!(values.velocity_gradient, gradient, comp = abs, tol = 1e-10);
                assert_scalar_eq!(values.divergence, 6.0, comp = abs, tol = 1e-10);
                assert_scalar_eq!(values.pressure, p(&geometry.point), comp = abs, tol = 1e-12);
            }
        }
    }
}

#[test]
fn interpolated_exact_solution_has_small_errors() {
    let discretization = taylor_hood(MeshFamily::TypeOne);
    let (level, exact, space) = setup(&discretization, 2);
    let coefficients = interpolate(&space, &level, |x| exact.velocity(x), |x| exact.pressure(x));
    let errors = compute_errors(&DiscreteSolution::new(&space, &level, coefficients), &exact);
    assert!(errors.velocity_l2 < 1e-2);
    assert!(errors.velocity_h1_seminorm < 0.2);
    assert!(errors.pressure_l2 < 0.1);
    // The interpolant of a divergence-free field is not exactly divergence-free
    assert!(errors.divergence_l2 > 0.0);
}

#[test]
fn removing_pressure_offset_is_idempotent() {
    let discretization = taylor_hood(MeshFamily::TypeOne);
    let (level, exact, space) = setup(&discretization, 1);
    let coefficients = interpolate(&space, &level, |x| exact.velocity(x), |x| exact.pressure(x) + 3.0);
    let mut solution = DiscreteSolution::new(&space, &level, coefficients);

    let offset = solution.remove_pressure_offset(&exact);
    assert_scalar_eq!(offset, 3.0, comp = abs, tol = 0.05);
    assert_scalar_eq!(solution.pressure_offset(&exact), 0.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(solution.remove_pressure_offset(&exact), 0.0, comp = abs, tol = 1e-12);
}

#[test]
#[should_panic]
fn solution_requires_matching_coefficients() {
    let discretization = taylor_hood(MeshFamily::TypeOne);
    let (level, _, space) = setup(&discretization, 0);
    DiscreteSolution::new(&space, &level, DVector::zeros(space.num_dofs() - 1));
}

#[test]
fn taylor_hood_solution_converges_under_refinement() {
    let discretization = taylor_hood(MeshFamily::Unstructured);
    let mut previous = None;
    for refinement in 0..3 {
        let (level, exact, space) = setup(&discretization, refinement);
        let (bilinear, linear) = FormAssembler
            .assemble(&space, &exact, &discretization.extras)
            .unwrap();
        let solution = StokesSolver
            .solve(&bilinear, &linear, &space, &level, &exact)
            .unwrap();
        assert_eq!(solution.velocity_order(), 2);
        assert_eq!(solution.pressure_order(), 1);
        assert_scalar_eq!(solution.pressure_offset(&exact), 0.0, comp = abs, tol = 1e-10);

        let errors = compute_errors(&solution, &exact);
        assert!(errors.velocity_l2 < 1.0 && errors.pressure_l2 < 1.0);
        if let Some(previous) = previous {
            let festokes::error::LevelErrors {
                velocity_h1_seminorm,
                pressure_l2,
                ..
            } = previous;
            assert!(errors.velocity_h1_seminorm < 0.5 * velocity_h1_seminorm);
            assert!(errors.pressure_l2 < 0.5 * pressure_l2);
        }
        previous = Some(errors);
    }
}

#[test]
fn dirichlet_vertices_carry_exact_boundary_values() {
    let discretization = taylor_hood(MeshFamily::SingularVertex);
    let (level, exact, space) = setup(&discretization, 0);
    let (bilinear, linear) = FormAssembler
        .assemble(&space, &exact, &discretization.extras)
        .unwrap();
    let solution = StokesSolver
        .solve(&bilinear, &linear, &space, &level, &exact)
        .unwrap();

    let (velocity, pressure) = solution.sample_at_vertices();
    let mesh = level.mesh();
    assert_eq!(velocity.len(), mesh.num_vertices());
    assert_eq!(pressure.len(), mesh.num_vertices());
    let on_boundary = level.topology().boundary_vertices(mesh.num_vertices());
    for ((x, u), &is_boundary) in mesh.vertices().iter().zip(&velocity).zip(&on_boundary) {
        if is_boundary {
            assert_matrix_eq!(*u, exact.velocity(x), comp = abs, tol = 1e-12);
        }
    }
    assert!(pressure.iter().all(|p| p.is_finite()));
}
