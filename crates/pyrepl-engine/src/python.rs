//! The interpreter session: a RustPython VM plus the live namespace.

use rustpython_vm as vm;
use rustpython_vm::builtins::{PyBaseException, PyCode};
use rustpython_vm::compiler::Mode;
use rustpython_vm::scope::Scope;
use rustpython_vm::{PyObjectRef, PyRef, PyResult, Settings, VirtualMachine};

use pyrepl_core::{ExecutionOutcome, InterpreterError};

/// Pseudo-filename attached to compiled snippets.
const SOURCE_NAME: &str = "<pyrepl>";

/// Swaps the process streams for in-memory buffers for the duration of one
/// execution. The buffers live in the namespace under reserved names and
/// are removed again by [`CAPTURE_CLEANUP`].
const CAPTURE_SETUP: &str = "\
import io as __pyrepl_io, sys as __pyrepl_sys
__pyrepl_prev_stdout = __pyrepl_sys.stdout
__pyrepl_prev_stderr = __pyrepl_sys.stderr
__pyrepl_stdout = __pyrepl_io.StringIO()
__pyrepl_stderr = __pyrepl_io.StringIO()
__pyrepl_sys.stdout = __pyrepl_stdout
__pyrepl_sys.stderr = __pyrepl_stderr
";

const CAPTURE_RESTORE: &str = "\
import sys as __pyrepl_sys
__pyrepl_stdout_value = __pyrepl_stdout.getvalue()
__pyrepl_stderr_value = __pyrepl_stderr.getvalue()
__pyrepl_sys.stdout = __pyrepl_prev_stdout
__pyrepl_sys.stderr = __pyrepl_prev_stderr
";

const CAPTURE_CLEANUP: &str = "\
for __pyrepl_name in [
    '__pyrepl_io', '__pyrepl_sys', '__pyrepl_stdout', '__pyrepl_stderr',
    '__pyrepl_prev_stdout', '__pyrepl_prev_stderr',
    '__pyrepl_stdout_value', '__pyrepl_stderr_value',
]:
    globals().pop(__pyrepl_name, None)
globals().pop('__pyrepl_name', None)
";

/// One interpreter process: the VM, the namespace, and the module preload
/// list used to rebuild the namespace on reset.
///
/// Not `Send`; [`crate::EngineHandle`] confines it to a worker thread.
pub struct PythonSession {
    interpreter: vm::Interpreter,
    scope: Scope,
    preload: Vec<String>,
}

impl PythonSession {
    /// Build the interpreter and seed the namespace with the preload set.
    #[must_use]
    pub fn new(preload: Vec<String>) -> Self {
        let interpreter = vm::Interpreter::with_init(Settings::default(), |vm| {
            vm.add_native_modules(rustpython_stdlib::get_module_inits());
            vm.add_frozen(rustpython_pylib::FROZEN_STDLIB);
        });
        let scope = interpreter.enter(|vm| vm.new_scope_with_builtins());
        let session = Self {
            interpreter,
            scope,
            preload,
        };
        session.import_preload();
        session
    }

    /// Run one snippet against the namespace, capturing output.
    ///
    /// Interpreter-level failures (syntax errors, raised exceptions) come
    /// back as unsuccessful outcomes with the namespace left as the snippet
    /// left it. `Err` means the capture harness itself failed.
    ///
    /// No timeout is imposed: long-running or blocking code holds the
    /// session until it finishes.
    pub fn run(&mut self, source: &str) -> Result<ExecutionOutcome, InterpreterError> {
        let scope = self.scope.clone();
        self.interpreter.enter(|vm| {
            let program = match compile_program(vm, source) {
                Ok(program) => program,
                Err(message) => return Ok(ExecutionOutcome::failure(message)),
            };

            run_snippet(vm, scope.clone(), CAPTURE_SETUP).map_err(|exc| internal(vm, &exc))?;

            let mut success = true;
            let mut value = None;
            if let Some(body) = program.body {
                if let Err(exc) = vm.run_code_obj(body, scope.clone()) {
                    vm.print_exception(exc);
                    success = false;
                }
            }
            if success {
                if let Some(trailing) = program.trailing {
                    match vm.run_code_obj(trailing, scope.clone()) {
                        Ok(result) => value = echo_repr(vm, &result),
                        Err(exc) => {
                            vm.print_exception(exc);
                            success = false;
                        }
                    }
                }
            }

            run_snippet(vm, scope.clone(), CAPTURE_RESTORE).map_err(|exc| internal(vm, &exc))?;
            let output = read_global_str(vm, &scope, "__pyrepl_stdout_value");
            let error = read_global_str(vm, &scope, "__pyrepl_stderr_value");
            run_snippet(vm, scope, CAPTURE_CLEANUP).map_err(|exc| internal(vm, &exc))?;

            Ok(ExecutionOutcome {
                output,
                error,
                value,
                success,
            })
        })
    }

    /// Discard every user-defined name and rebuild the pre-loaded namespace.
    /// The interpreter process itself survives.
    pub fn reset(&mut self) {
        self.scope = self.interpreter.enter(VirtualMachine::new_scope_with_builtins);
        self.import_preload();
    }

    fn import_preload(&self) {
        let scope = self.scope.clone();
        let modules = self.preload.clone();
        self.interpreter.enter(|vm| {
            for module in &modules {
                let statement = format!("import {module}");
                if let Err(exc) = run_snippet(vm, scope.clone(), &statement) {
                    tracing::warn!(
                        "failed to preload module {module}: {}",
                        render_exception(vm, &exc)
                    );
                }
            }
        });
    }
}

/// A snippet split for REPL-style echoing: optional statement body plus an
/// optional trailing expression evaluated for its value.
struct CompiledProgram {
    body: Option<PyRef<PyCode>>,
    trailing: Option<PyRef<PyCode>>,
}

fn compile_program(vm: &VirtualMachine, source: &str) -> Result<CompiledProgram, String> {
    // a snippet that is one bare expression evaluates directly
    if let Ok(trailing) = vm.compile(source, Mode::Eval, SOURCE_NAME.to_owned()) {
        return Ok(CompiledProgram {
            body: None,
            trailing: Some(trailing),
        });
    }
    let full = vm
        .compile(source, Mode::Exec, SOURCE_NAME.to_owned())
        .map_err(|err| format!("SyntaxError: {err}"))?;

    // otherwise try to peel a trailing top-level expression off the end
    if let Some((head, tail)) = split_trailing_line(source) {
        if let Ok(trailing) = vm.compile(&tail, Mode::Eval, SOURCE_NAME.to_owned()) {
            if let Ok(body) = vm.compile(&head, Mode::Exec, SOURCE_NAME.to_owned()) {
                return Ok(CompiledProgram {
                    body: Some(body),
                    trailing: Some(trailing),
                });
            }
        }
    }
    Ok(CompiledProgram {
        body: Some(full),
        trailing: None,
    })
}

/// Head/tail split at the last non-blank line. An indented last line is part
/// of an enclosing block and never a candidate.
fn split_trailing_line(source: &str) -> Option<(String, String)> {
    let lines: Vec<&str> = source.lines().collect();
    let last = lines.iter().rposition(|line| !line.trim().is_empty())?;
    if last == 0 || lines[last].starts_with([' ', '\t']) {
        return None;
    }
    Some((lines[..last].join("\n"), lines[last..].join("\n")))
}

fn run_snippet(vm: &VirtualMachine, scope: Scope, source: &str) -> PyResult<PyObjectRef> {
    let code = vm
        .compile(source, Mode::Exec, SOURCE_NAME.to_owned())
        .map_err(|err| vm.new_syntax_error(&err, Some(source)))?;
    vm.run_code_obj(code, scope)
}

fn echo_repr(vm: &VirtualMachine, result: &PyObjectRef) -> Option<String> {
    if vm.is_none(result) {
        return None;
    }
    result
        .repr(vm)
        .map(|repr| repr.as_str().to_owned())
        .ok()
}

fn read_global_str(vm: &VirtualMachine, scope: &Scope, name: &str) -> String {
    scope
        .globals
        .get_item(name, vm)
        .ok()
        .and_then(|value| value.try_to_value::<String>(vm).ok())
        .unwrap_or_default()
}

fn render_exception(vm: &VirtualMachine, exc: &PyRef<PyBaseException>) -> String {
    let mut rendered = String::new();
    if vm.write_exception(&mut rendered, exc).is_err() {
        rendered = "<unprintable exception>".to_owned();
    }
    rendered
}

fn internal(vm: &VirtualMachine, exc: &PyRef<PyBaseException>) -> InterpreterError {
    InterpreterError::Internal(render_exception(vm, exc).trim().to_owned())
}
