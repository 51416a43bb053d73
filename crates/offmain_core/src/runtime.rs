use crate::config::Config;

/// Loader bootstrap prepended to entry and worker units.
///
/// `__OFFMAIN_DEFINE__` is replaced with the declaration function name and
/// `__OFFMAIN_USE_EVAL__` with `true` or `false`.
pub const LOADER_JS: &str = r#"(function () {
  // Already installed in this context.
  if (self.__OFFMAIN_DEFINE__) {
    return;
  }
  const useEval = __OFFMAIN_USE_EVAL__;
  // address -> Promise<exports>, created on first request
  const registry = {};
  // unit name -> Promise<exports>, created by the unit's own declaration
  const declared = {};

  function fetchUnit(name) {
    if (useEval) {
      return fetch(name)
        .then(resp => resp.text())
        .then(code => {
          (0, eval)(code);
        });
    }
    if ("document" in self) {
      return new Promise((resolve, reject) => {
        const script = document.createElement("script");
        script.src = name;
        script.defer = true;
        script.onload = resolve;
        script.onerror = reject;
        document.head.appendChild(script);
      });
    }
    // A failed import rejects the request instead of throwing into define.
    try {
      importScripts(name);
      return Promise.resolve();
    } catch (e) {
      return Promise.reject(e);
    }
  }

  function singleRequire(name) {
    if (!registry[name]) {
      // Recorded before the fetch starts, so a failed address is never refetched.
      registry[name] = Promise.resolve()
        .then(() => (declared[name] ? undefined : fetchUnit(name)))
        .then(() => {
          if (!declared[name]) {
            throw new Error(`Module ${name} didn’t register its module`);
          }
          return declared[name];
        });
    }
    return registry[name];
  }

  function require(names, resolve, reject) {
    return Promise.all(names.map(singleRequire)).then(modules => {
      const value = modules.length === 1 ? modules[0] : modules;
      if (resolve) {
        resolve(value);
      }
      return value;
    }, reject);
  }

  self.__OFFMAIN_DEFINE__ = (moduleName, depsNames, factory) => {
    if (declared[moduleName]) {
      return;
    }
    const exports = {};
    declared[moduleName] = Promise.all(
      depsNames.map(depName => {
        if (depName === "exports") {
          return exports;
        }
        if (depName === "require") {
          return require;
        }
        return singleRequire(depName);
      })
    ).then(deps => {
      exports.default = factory(...deps);
      return exports;
    });
  };
})();
"#;

/// The bootstrap text for `config`: the configured override verbatim, or
/// the built-in loader rendered with the configured names.
pub fn render_loader(config: &Config) -> String {
    match &config.loader {
        Some(custom) => custom.clone(),
        None => LOADER_JS
            .replace("__OFFMAIN_DEFINE__", &config.amd_function_name)
            .replace("__OFFMAIN_USE_EVAL__", if config.use_eval { "true" } else { "false" }),
    }
}
