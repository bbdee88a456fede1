use minishell::Interpreter;

fn main() {
    let status = match Interpreter::new() {
        Ok(mut shell) => shell.repl().unwrap_or_else(|err| {
            eprintln!("minishell: {err}");
            1
        }),
        Err(err) => {
            eprintln!("minishell: {err}");
            1
        }
    };
    std::process::exit(status);
}
