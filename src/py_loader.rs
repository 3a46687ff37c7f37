//! Python binding for the batch loader

use std::sync::Arc;

use numpy::{PyArray1, PyArrayMethods};
use pyo3::exceptions::{PyIOError, PyIndexError, PyKeyError, PyValueError};
use pyo3::prelude::*;

use crate::config::{ExecutionMode, GraphConfig, LoaderConfig};
use crate::data::{Batch, CrystalDataset, DataLoader, RecordTable};
use crate::error::{DataError, Result};

impl From<DataError> for PyErr {
    fn from(err: DataError) -> PyErr {
        match err {
            DataError::Lookup(_) => PyKeyError::new_err(err.to_string()),
            DataError::Io(_) => PyIOError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// Batches of crystal graphs read from a CGCNN dataset directory, or from
/// in-memory columns through `CrystalDataLoader.from_table`
///
/// Indexing returns `((atom_fea, nbr_fea, nbr_fea_idx, crystal_atom_idx), target)`
/// with the batch ids appended when `return_id` is set.
#[pyclass(name = "CrystalDataLoader")]
pub struct PyCrystalDataLoader {
    loader: DataLoader,
    return_id: bool,
}

#[pymethods]
impl PyCrystalDataLoader {
    #[new]
    #[pyo3(signature = (
        root_dir,
        batch_size=1,
        shuffle=false,
        drop_remainder=false,
        seed=None,
        execution="sequential",
        num_threads=0,
        max_num_nbr=12,
        radius=8.0,
        dmin=0.0,
        step=0.2,
        variance=None,
        random_seed=Some(123),
        cache_capacity=None,
        return_id=false,
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root_dir: String,
        batch_size: usize,
        shuffle: bool,
        drop_remainder: bool,
        seed: Option<u64>,
        execution: &str,
        num_threads: usize,
        max_num_nbr: usize,
        radius: f64,
        dmin: f64,
        step: f64,
        variance: Option<f64>,
        random_seed: Option<u64>,
        cache_capacity: Option<usize>,
        return_id: bool,
    ) -> PyResult<Self> {
        let (graph_config, loader_config) = configs(
            batch_size,
            shuffle,
            drop_remainder,
            seed,
            execution,
            num_threads,
            max_num_nbr,
            radius,
            dmin,
            step,
            variance,
            random_seed,
            cache_capacity,
        )?;
        let dataset = CrystalDataset::from_directory(&root_dir, &graph_config)?;
        let loader = DataLoader::new(Arc::new(dataset), &loader_config)?;
        Ok(Self { loader, return_id })
    }

    /// Build from in-memory `id`, `target` and `cif` columns, e.g. a DataFrame's
    #[staticmethod]
    #[pyo3(signature = (
        ids,
        targets,
        cifs,
        atom_init,
        batch_size=1,
        shuffle=false,
        drop_remainder=false,
        seed=None,
        execution="sequential",
        num_threads=0,
        max_num_nbr=12,
        radius=8.0,
        dmin=0.0,
        step=0.2,
        variance=None,
        random_seed=Some(123),
        cache_capacity=None,
        return_id=false,
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn from_table(
        ids: Vec<String>,
        targets: Vec<f64>,
        cifs: Vec<String>,
        atom_init: String,
        batch_size: usize,
        shuffle: bool,
        drop_remainder: bool,
        seed: Option<u64>,
        execution: &str,
        num_threads: usize,
        max_num_nbr: usize,
        radius: f64,
        dmin: f64,
        step: f64,
        variance: Option<f64>,
        random_seed: Option<u64>,
        cache_capacity: Option<usize>,
        return_id: bool,
    ) -> PyResult<Self> {
        let (graph_config, loader_config) = configs(
            batch_size,
            shuffle,
            drop_remainder,
            seed,
            execution,
            num_threads,
            max_num_nbr,
            radius,
            dmin,
            step,
            variance,
            random_seed,
            cache_capacity,
        )?;

        let table = RecordTable::from_columns(ids, targets, cifs)?;
        let dataset = CrystalDataset::from_table(&table, &atom_init, &graph_config)?;
        let loader = DataLoader::new(Arc::new(dataset), &loader_config)?;
        Ok(Self { loader, return_id })
    }

    fn __len__(&self) -> usize {
        self.loader.len()
    }

    fn __getitem__(&self, py: Python<'_>, index: isize) -> PyResult<PyObject> {
        let len = self.loader.len() as isize;
        let resolved = if index < 0 { index + len } else { index };
        if resolved < 0 || resolved >= len {
            return Err(PyIndexError::new_err(format!(
                "Batch index {} out of range for {} batches",
                index, len
            )));
        }

        let batch = py.allow_threads(|| self.loader.get(resolved as usize))?;
        batch_to_py(py, batch, self.return_id)
    }

    fn on_epoch_end(&mut self) {
        self.loader.on_epoch_end();
    }

    /// `(atom_fea_len, nbr_fea_len)`
    #[getter]
    fn feature_dims(&self) -> (usize, usize) {
        self.loader.dataset().feature_dims()
    }

    #[getter]
    fn num_crystals(&self) -> usize {
        self.loader.dataset().len()
    }
}

#[allow(clippy::too_many_arguments)]
fn configs(
    batch_size: usize,
    shuffle: bool,
    drop_remainder: bool,
    seed: Option<u64>,
    execution: &str,
    num_threads: usize,
    max_num_nbr: usize,
    radius: f64,
    dmin: f64,
    step: f64,
    variance: Option<f64>,
    random_seed: Option<u64>,
    cache_capacity: Option<usize>,
) -> Result<(GraphConfig, LoaderConfig)> {
    let execution = match ExecutionMode::from_str(execution)? {
        ExecutionMode::Parallel { .. } => ExecutionMode::Parallel { num_threads },
        mode => mode,
    };
    let graph_config = GraphConfig {
        max_num_nbr,
        radius,
        dmin,
        step,
        variance,
        random_seed,
        cache_capacity,
    };
    let loader_config = LoaderConfig {
        batch_size,
        shuffle,
        drop_remainder,
        seed,
        execution,
    };
    Ok((graph_config, loader_config))
}

fn batch_to_py(py: Python<'_>, batch: Batch, return_id: bool) -> PyResult<PyObject> {
    let n = batch.num_atoms;
    let m = batch.max_num_nbr;

    let atom_fea = PyArray1::from_vec_bound(py, batch.atom_features).reshape((n, batch.atom_fea_len))?;
    let nbr_fea = PyArray1::from_vec_bound(py, batch.neighbor_features)
        .reshape((n, m, batch.nbr_fea_len))?;
    let nbr_idx: Vec<i64> = batch.neighbor_index.iter().map(|&j| j as i64).collect();
    let nbr_fea_idx = PyArray1::from_vec_bound(py, nbr_idx).reshape((n, m))?;

    let crystal_atom_idx: Vec<Bound<'_, PyArray1<i64>>> = batch
        .crystal_atom_index
        .iter()
        .map(|range| {
            let idx: Vec<i64> = range.clone().map(|i| i as i64).collect();
            PyArray1::from_vec_bound(py, idx)
        })
        .collect();

    let k = batch.targets.len();
    let target = PyArray1::from_vec_bound(py, batch.targets).reshape((k, 1))?;

    let inputs = (atom_fea, nbr_fea, nbr_fea_idx, crystal_atom_idx).into_py(py);
    if return_id {
        Ok((inputs, target, batch.ids).into_py(py))
    } else {
        Ok((inputs, target).into_py(py))
    }
}
