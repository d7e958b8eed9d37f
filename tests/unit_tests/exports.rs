use hytra::expr::Expr;
use hytra::exports::{
    DerivedQuantities, DerivedQuantity, ErrorExport, ErrorNorm, Snapshot, VtkExports,
};
use hytra::materials::{Material, Materials};
use hytra::mesh::procedural::create_uniform_interval_mesh;
use hytra::mesh::{LEFT_SURFACE, RIGHT_SURFACE};
use hytra::settings::ConfigError;
use hytra::sources::Field;
use hytra::space::{Function, FunctionSpace};
use matrixcompare::assert_scalar_eq;
use std::path::PathBuf;
use std::sync::Arc;

/// Two materials on `[0, 0.5]` and `[0.5, 1]` with a mobile field and one trap.
struct Fixture {
    materials: Materials,
    u: Function,
    temperature: Expr,
}

impl Fixture {
    fn new(materials: Vec<Material>) -> Self {
        let mut mesh = create_uniform_interval_mesh(0.0, 1.0, 4).unwrap();
        mesh.mark_volumes(|x| if x < 0.5 { 1 } else { 2 });
        let u = Function::new(FunctionSpace::new(Arc::new(mesh), 2), "u");
        u.interpolate(&[Expr::x(), Expr::constant(0.5)], 0.0);
        Self {
            materials: Materials::new(materials),
            u,
            temperature: Expr::constant(500.0),
        }
    }

    fn plain() -> Self {
        Self::new(vec![Material::new(1, 2.0, 0.0), Material::new(2, 2.0, 0.0)])
    }

    fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            materials: &self.materials,
            u: &self.u,
            num_traps: 1,
            temperature: &self.temperature,
            temperature_function: None,
            t: 2.0,
        }
    }
}

fn output_dir(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("exports").join(name)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn vertex_values_use_the_concentration_of_each_material() {
    let fixture = Fixture::new(vec![
        Material::new(1, 1.0, 0.0).with_solubility(2.0, 0.0),
        Material::new(2, 1.0, 0.0).with_solubility(3.0, 0.0),
    ]);
    let snapshot = fixture.snapshot();

    // The interface vertex takes the value of the cell on its left
    let mobile = snapshot.vertex_values(Field::Mobile).unwrap();
    assert_eq!(mobile, vec![0.0, 0.5, 1.0, 2.25, 3.0]);
    let retention = snapshot.vertex_values(Field::Retention).unwrap();
    assert_eq!(retention, vec![0.5, 1.0, 1.5, 2.75, 3.5]);
    assert_eq!(snapshot.vertex_values(Field::Trap(0)).unwrap(), vec![0.5; 5]);
    assert_eq!(snapshot.vertex_values(Field::Temperature).unwrap(), vec![500.0; 5]);
    assert!(matches!(
        snapshot.vertex_values(Field::Trap(1)),
        Err(ConfigError::InvalidField(_))
    ));
}

#[test]
fn volume_quantities() {
    let fixture = Fixture::plain();
    let snapshot = fixture.snapshot();

    let total = DerivedQuantity::TotalVolume {
        field: Field::Mobile,
        volume: 2,
    };
    assert_scalar_eq!(total.compute(&snapshot).unwrap(), 0.375, comp = abs, tol = 1e-14);
    let average = DerivedQuantity::AverageVolume {
        field: Field::Retention,
        volume: 1,
    };
    assert_scalar_eq!(average.compute(&snapshot).unwrap(), 0.75, comp = abs, tol = 1e-14);
    let minimum = DerivedQuantity::MinimumVolume {
        field: Field::Mobile,
        volume: 2,
    };
    assert_eq!(minimum.compute(&snapshot).unwrap(), 0.5);
    let maximum = DerivedQuantity::MaximumVolume {
        field: Field::Mobile,
        volume: 1,
    };
    assert_eq!(maximum.compute(&snapshot).unwrap(), 0.5);

    let empty = DerivedQuantity::TotalVolume {
        field: Field::Mobile,
        volume: 3,
    };
    assert!(empty.compute(&snapshot).is_err());
}

#[test]
fn surface_fluxes_and_point_values() {
    let fixture = Fixture::plain();
    let snapshot = fixture.snapshot();

    // D = 2 and grad c = 1
    let left = DerivedQuantity::SurfaceFlux {
        field: Field::Mobile,
        surface: LEFT_SURFACE,
    };
    assert_scalar_eq!(left.compute(&snapshot).unwrap(), 2.0, comp = abs, tol = 1e-12);
    let right = DerivedQuantity::SurfaceFlux {
        field: Field::Mobile,
        surface: RIGHT_SURFACE,
    };
    assert_scalar_eq!(right.compute(&snapshot).unwrap(), -2.0, comp = abs, tol = 1e-12);
    let trapped = DerivedQuantity::SurfaceFlux {
        field: Field::Trap(0),
        surface: RIGHT_SURFACE,
    };
    assert!(trapped.compute(&snapshot).is_err());
    let no_conductivity = DerivedQuantity::SurfaceFlux {
        field: Field::Temperature,
        surface: RIGHT_SURFACE,
    };
    assert!(no_conductivity.compute(&snapshot).is_err());

    let point = DerivedQuantity::PointValue {
        field: Field::Mobile,
        x: 0.3,
    };
    assert_scalar_eq!(point.compute(&snapshot).unwrap(), 0.3, comp = abs, tol = 1e-14);
    let outside = DerivedQuantity::PointValue {
        field: Field::Mobile,
        x: 2.0,
    };
    assert!(outside.compute(&snapshot).is_err());
}

#[test]
fn derived_quantities_table() {
    let fixture = Fixture::plain();
    let snapshot = fixture.snapshot();
    let json = r#"[ { "type": "total_volume", "field": "mobile", "volume": 1 },
                    { "type": "point_value", "field": { "trap": 0 }, "x": 5.0 } ]"#;
    let quantities: Vec<DerivedQuantity> = serde_json::from_str(json).unwrap();

    let filename = output_dir("table").join("derived_quantities.csv");
    let mut table = DerivedQuantities::new(quantities)
        .with_nb_iterations_between_compute(2)
        .with_filename(&filename)
        .unwrap();
    assert_eq!(
        table.headers(),
        vec!["t(s)".to_string(), "Total solute volume 1".to_string(), "1 value at 5".to_string()]
    );

    table.compute(&snapshot, false);
    assert!(table.rows().is_empty());
    table.compute(&snapshot, false);
    table.compute(&snapshot, true);
    assert_eq!(table.rows().len(), 2);
    let row = &table.rows()[0];
    assert_eq!(row[0], 2.0);
    assert_scalar_eq!(row[1], 0.125, comp = abs, tol = 1e-14);
    // A failing quantity does not abort the run
    assert!(row[2].is_nan());

    table.write().unwrap();
    let contents = std::fs::read_to_string(&filename).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "t(s),Total solute volume 1,1 value at 5");
    assert!(lines[1].starts_with("2.000000000000000e0,1.250000000000000e-1,"));

    assert_eq!(
        DerivedQuantities::new(vec![]).with_filename("").unwrap_err(),
        ConfigError::EmptyFolder
    );
}

#[test]
fn vtk_configuration_errors() {
    assert_eq!(
        VtkExports::new(vec![Field::Mobile], vec!["solute".to_string()], "").unwrap_err(),
        ConfigError::EmptyFolder
    );
    assert_eq!(
        VtkExports::new(vec![Field::Mobile, Field::Trap(0)], vec!["solute".to_string()], "out").unwrap_err(),
        ConfigError::LabelCountMismatch { fields: 2, labels: 1 }
    );
    let exports = VtkExports::new(vec![Field::Trap(1)], vec!["trap_2".to_string()], "out").unwrap();
    assert!(exports.check(2).is_ok());
    assert!(matches!(exports.check(1), Err(ConfigError::InvalidField(_))));
}

#[test]
fn vtk_files_are_written_on_export_steps() {
    let fixture = Fixture::plain();
    let snapshot = fixture.snapshot();
    let folder = output_dir("vtk");
    let mut exports = VtkExports::new(
        vec![Field::Mobile, Field::Retention, Field::Temperature],
        vec!["solute".to_string(), "retention".to_string(), "T".to_string()],
        &folder,
    )
    .unwrap()
    .with_nb_iterations_between_exports(2);

    assert_eq!(exports.export(&snapshot, false).unwrap(), None);
    let path = exports.export(&snapshot, false).unwrap().unwrap();
    assert_eq!(path, folder.join("snapshot_000000.vtk"));
    assert_eq!(exports.export(&snapshot, true).unwrap(), Some(folder.join("snapshot_000001.vtk")));
    assert_eq!(exports.written().len(), 2);

    let contents = std::fs::read(&path).unwrap();
    assert!(contains(&contents, b"UNSTRUCTURED_GRID"));
    assert!(contains(&contents, b"retention"));

    let mut last_only = VtkExports::new(vec![Field::Mobile], vec!["solute".to_string()], output_dir("vtk_last"))
        .unwrap()
        .with_last_timestep_only(true);
    assert_eq!(last_only.export(&snapshot, false).unwrap(), None);
    assert_eq!(last_only.export(&snapshot, false).unwrap(), None);
    assert!(last_only.export(&snapshot, true).unwrap().is_some());
}

#[test]
fn error_norms() {
    let fixture = Fixture::plain();
    let snapshot = fixture.snapshot();

    let exact = ErrorExport::new(Field::Mobile, Expr::x(), ErrorNorm::Max);
    let value = exact.compute(&snapshot).unwrap();
    assert_eq!(value.t, 2.0);
    assert_scalar_eq!(value.value, 0.0, comp = abs, tol = 1e-15);

    let offset = ErrorExport::new(Field::Trap(0), 0.25, ErrorNorm::L2);
    assert_scalar_eq!(offset.compute(&snapshot).unwrap().value, 0.25, comp = abs, tol = 1e-14);

    // A prescribed temperature is compared through its expression
    let temperature = ErrorExport::new(Field::Temperature, 490.0 + Expr::time() * 5.0, ErrorNorm::Max);
    assert_scalar_eq!(temperature.compute(&snapshot).unwrap().value, 0.0, comp = abs, tol = 1e-12);
    let temperature = ErrorExport::new(Field::Temperature, 499.0, ErrorNorm::L2);
    assert_scalar_eq!(temperature.compute(&snapshot).unwrap().value, 1.0, comp = abs, tol = 1e-12);

    let retention = ErrorExport::new(Field::Retention, 0.0, ErrorNorm::Max);
    assert!(matches!(retention.compute(&snapshot), Err(ConfigError::InvalidField(_))));
}
