use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::{fingerprint_of, Script};

fn parse(script: &str) -> PyResult<Script> {
    Script::parse(script).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pyfunction]
#[pyo3(name = "edit")]
fn py_edit(text: &str, script: &str) -> PyResult<Vec<String>> {
    let script = parse(script)?;
    crate::edit_text(text, &script).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pyfunction]
fn fingerprint(script: &str) -> PyResult<Vec<String>> {
    let script = parse(script)?;
    let fp = fingerprint_of(&[&script]).map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(fp.into_tokens())
}

#[pyfunction]
fn digest(script: &str) -> PyResult<String> {
    let script = parse(script)?;
    let fp = fingerprint_of(&[&script]).map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(fp.digest())
}

#[pymodule]
fn linescope(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_edit, m)?)?;
    m.add_function(wrap_pyfunction!(fingerprint, m)?)?;
    m.add_function(wrap_pyfunction!(digest, m)?)?;
    Ok(())
}
